//! Core data models for the Watermelon API
//!
//! The upstream snapshot carries two collections: `Sheet1` (one record per
//! company) and `Campaigns` (boycott/divestment campaigns referencing companies
//! by slug). This module holds both raw shapes and the flattened
//! [`CompanyOutput`] the API serves.

pub mod normalize;
pub mod snapshot;

pub use normalize::{NormalizeError, Normalizer};
pub use snapshot::{SnapshotClient, SnapshotError};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Decoded snapshot document: the dataset sits under a top-level `data` key
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotDocument {
    pub data: RawDataset,
}

/// The two collections the normalizer consumes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDataset {
    #[serde(rename = "Sheet1")]
    pub companies: Vec<RawCompanyRecord>,
    #[serde(rename = "Campaigns", default)]
    pub campaigns: Vec<RawCampaignRecord>,
}

/// One row of the upstream `Sheet1` collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCompanyRecord {
    pub data: RawCompanyFields,
}

/// Column values of a company row
///
/// Required columns are still `Option` here so the normalizer can report which
/// one is missing and on which row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCompanyFields {
    #[serde(rename = "Company Name")]
    pub company_name: Option<String>,
    /// Slug, used as the campaign merge key
    #[serde(rename = "Company name")]
    pub company_id: Option<String>,
    #[serde(rename = "Sector")]
    pub sector: Option<String>,
    #[serde(rename = "Complicity details")]
    pub complicity_details: Option<String>,
    #[serde(rename = "Record last updated")]
    pub record_last_updated: Option<RecordTimestamp>,
    #[serde(rename = "Source")]
    pub source: Option<Value>,
    #[serde(rename = "Second source")]
    pub second_source: Option<Value>,
    #[serde(rename = "Third source")]
    pub third_source: Option<Value>,
    #[serde(rename = "Fourth source")]
    pub fourth_source: Option<Value>,
    #[serde(rename = "Military", default, deserialize_with = "present")]
    pub military: Option<Value>,
    #[serde(rename = "Settlement production", default, deserialize_with = "present")]
    pub settlement_production: Option<Value>,
    #[serde(rename = "Population control", default, deserialize_with = "present")]
    pub population_control: Option<Value>,
    #[serde(rename = "Economic exploitation", default, deserialize_with = "present")]
    pub economic_exploitation: Option<Value>,
    #[serde(rename = "Cultural", default, deserialize_with = "present")]
    pub cultural: Option<Value>,
}

impl RawCompanyFields {
    /// Source columns in output order
    pub fn sources(&self) -> [Option<&Value>; 4] {
        [
            self.source.as_ref(),
            self.second_source.as_ref(),
            self.third_source.as_ref(),
            self.fourth_source.as_ref(),
        ]
    }
}

/// Upstream date cell, flattened to its `repr`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordTimestamp {
    pub repr: Option<String>,
}

/// One row of the upstream `Campaigns` collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCampaignRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub data: RawCampaignFields,
}

/// Column values of a campaign row; every column may be missing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCampaignFields {
    #[serde(rename = "Campaign Name")]
    pub campaign_name: Option<Value>,
    /// Comma-separated company slugs
    #[serde(rename = "Companies")]
    pub companies: Option<Value>,
    #[serde(rename = "Description")]
    pub description: Option<Value>,
    #[serde(rename = "Location")]
    pub location: Option<Value>,
    #[serde(rename = "Outcomes")]
    pub outcomes: Option<Value>,
    #[serde(rename = "Aims achieved")]
    pub aims_achieved: Option<Value>,
    #[serde(rename = "Campaign Groups")]
    pub campaign_groups: Option<Value>,
    /// Glide stores the methods column under a generated column id
    #[serde(rename = "4Ajtq")]
    pub methods: Option<Value>,
    #[serde(rename = "Campaign link")]
    pub campaign_link: Option<Value>,
    #[serde(rename = "What is the target aim of the campaign, if it is not ending complicity?")]
    pub target_aim: Option<Value>,
}

/// Keeps a key that is present with a `null` value as `Some(Value::Null)`;
/// only an absent key (via `default`) reads as `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Normalized, ticker-enriched company record served by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyOutput {
    pub company_name: String,
    pub company_id: String,
    pub sector: String,
    pub complicity_details: String,
    pub record_last_updated: String,
    /// Non-empty source columns, in column order
    pub sources: Vec<String>,
    /// `null` when the company has no known listing
    pub stock_ticker: Option<String>,
    #[serde(flatten)]
    pub complicity: ComplicityCategories,
    /// Absent (not null) when no campaign references this company
    #[serde(flatten)]
    pub campaign: Option<CampaignDetails>,
}

/// Complicity category flags, emitted only for categories present upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplicityCategories {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub military: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub settlement_production: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub population_control: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub economic_exploitation: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub cultural: Option<Value>,
}

/// Campaign fields merged onto a company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDetails {
    pub campaign_name: String,
    pub campaign_id: String,
    pub campaign_description: String,
    pub campaign_location: String,
    pub campaign_outcomes: String,
    pub campaign_aims_achieved: String,
    pub campaign_groups: String,
    pub campaign_methods: String,
    pub campaign_links: Vec<String>,
    pub target_aim: String,
}
