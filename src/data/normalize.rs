//! Flattens the raw snapshot into [`CompanyOutput`] records
//!
//! Two passes: one output record per company row (in input order, with its
//! ticker resolved), then every campaign is merged onto the companies it names.
//! A later campaign naming the same company overwrites an earlier one.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::{
    CampaignDetails, CompanyOutput, ComplicityCategories, RawCampaignRecord, RawCompanyFields,
    RawDataset, SnapshotDocument,
};
use crate::ticker::TickerLookup;

/// Errors that can occur while normalizing the snapshot
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The decoded document is not shaped like a snapshot
    #[error("unexpected snapshot shape: {0}")]
    InvalidShape(#[from] serde_json::Error),

    /// A company row lacks a required column
    #[error("company record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },
}

/// Builds the served company list from a decoded snapshot
#[derive(Clone)]
pub struct Normalizer {
    tickers: Arc<dyn TickerLookup>,
}

impl Normalizer {
    pub fn new(tickers: Arc<dyn TickerLookup>) -> Self {
        Self { tickers }
    }

    /// Normalizes a decoded snapshot document (`{"data": {"Sheet1": ..., "Campaigns": ...}}`)
    pub async fn normalize_document(
        &self,
        document: &Value,
    ) -> Result<Vec<CompanyOutput>, NormalizeError> {
        let document = SnapshotDocument::deserialize(document)?;
        self.normalize(&document.data).await
    }

    /// Produces one output record per company row, in input order
    pub async fn normalize(&self, raw: &RawDataset) -> Result<Vec<CompanyOutput>, NormalizeError> {
        let mut companies = Vec::with_capacity(raw.companies.len());
        for (index, record) in raw.companies.iter().enumerate() {
            companies.push(self.build_company(index, &record.data).await?);
        }

        merge_campaigns(&mut companies, &raw.campaigns);

        info!(
            companies = companies.len(),
            campaigns = raw.campaigns.len(),
            "normalized snapshot"
        );
        Ok(companies)
    }

    async fn build_company(
        &self,
        index: usize,
        fields: &RawCompanyFields,
    ) -> Result<CompanyOutput, NormalizeError> {
        let required = |value: Option<&String>, field: &'static str| {
            value
                .cloned()
                .ok_or(NormalizeError::MissingField { index, field })
        };

        let company_name = required(fields.company_name.as_ref(), "Company Name")?;
        let company_id = required(fields.company_id.as_ref(), "Company name")?;
        let sector = required(fields.sector.as_ref(), "Sector")?;
        let complicity_details =
            required(fields.complicity_details.as_ref(), "Complicity details")?;
        let record_last_updated = required(
            fields
                .record_last_updated
                .as_ref()
                .and_then(|stamp| stamp.repr.as_ref()),
            "Record last updated",
        )?;

        let sources = fields
            .sources()
            .into_iter()
            .map(text)
            .filter(|source| !source.trim().is_empty())
            .collect();

        let stock_ticker = self.tickers.lookup(&company_name).await;

        Ok(CompanyOutput {
            company_name,
            company_id,
            sector,
            complicity_details,
            record_last_updated,
            sources,
            stock_ticker,
            complicity: ComplicityCategories {
                military: fields.military.clone(),
                settlement_production: fields.settlement_production.clone(),
                population_control: fields.population_control.clone(),
                economic_exploitation: fields.economic_exploitation.clone(),
                cultural: fields.cultural.clone(),
            },
            campaign: None,
        })
    }
}

/// Merges campaigns onto companies by slug, last campaign wins
///
/// Duplicate slugs resolve to the first company carrying them.
pub fn merge_campaigns(companies: &mut [CompanyOutput], campaigns: &[RawCampaignRecord]) {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(companies.len());
    for (position, company) in companies.iter().enumerate() {
        positions
            .entry(company.company_id.clone())
            .or_insert(position);
    }

    for campaign in campaigns {
        let slugs = match campaign.data.companies.as_ref().and_then(Value::as_str) {
            Some(slugs) if !slugs.trim().is_empty() => slugs,
            _ => {
                debug!(campaign = %text(campaign.id.as_ref()), "campaign names no companies");
                continue;
            }
        };

        let details = campaign_details(campaign);
        for slug in slugs.split(',').map(str::trim) {
            if let Some(&position) = positions.get(slug) {
                companies[position].campaign = Some(details.clone());
            }
        }
    }
}

fn campaign_details(campaign: &RawCampaignRecord) -> CampaignDetails {
    let data = &campaign.data;
    CampaignDetails {
        campaign_name: text(data.campaign_name.as_ref()),
        campaign_id: text(campaign.id.as_ref()),
        campaign_description: text(data.description.as_ref()),
        campaign_location: text(data.location.as_ref()),
        campaign_outcomes: text(data.outcomes.as_ref()),
        campaign_aims_achieved: text(data.aims_achieved.as_ref()),
        campaign_groups: text(data.campaign_groups.as_ref()),
        campaign_methods: text(data.methods.as_ref()),
        campaign_links: links(data.campaign_link.as_ref()),
        target_aim: text(data.target_aim.as_ref()),
    }
}

/// Renders a cell as text; missing and null cells become ""
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Flattens the nested link cell into its non-empty entries
fn links(value: Option<&Value>) -> Vec<String> {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Null => {}
            Value::String(s) => {
                if !s.trim().is_empty() {
                    out.push(s.clone());
                }
            }
            Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
            Value::Object(map) => map.values().for_each(|item| collect(item, out)),
            other => out.push(other.to_string()),
        }
    }

    let mut out = Vec::new();
    if let Some(value) = value {
        collect(value, &mut out);
    }
    out
}
