use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{AppError, Result};

/// The six image positions of a program page, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    Main,
    MainContent,
    WhatCauses,
    HealthRisks,
    Strategies,
    Conclusion,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 6] = [
        ImageSlot::Main,
        ImageSlot::MainContent,
        ImageSlot::WhatCauses,
        ImageSlot::HealthRisks,
        ImageSlot::Strategies,
        ImageSlot::Conclusion,
    ];

    /// Multipart field carrying this slot's file.
    pub fn form_field(self) -> &'static str {
        match self {
            ImageSlot::Main => "mainImage",
            ImageSlot::MainContent => "mainContentImage",
            ImageSlot::WhatCauses => "whatCausesImage",
            ImageSlot::HealthRisks => "healthRisksImage",
            ImageSlot::Strategies => "strategiesImage",
            ImageSlot::Conclusion => "conclusionImage",
        }
    }

    pub fn from_form_field(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.form_field() == name)
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImageSlot::Main => "main",
            ImageSlot::MainContent => "main content",
            ImageSlot::WhatCauses => "what causes",
            ImageSlot::HealthRisks => "health risks",
            ImageSlot::Strategies => "strategies",
            ImageSlot::Conclusion => "conclusion",
        };
        f.write_str(label)
    }
}

/// A stored image: the blob store's identifier and its public URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub public_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImages {
    pub main: ProgramImage,
    pub main_content: ProgramImage,
    pub what_causes: ProgramImage,
    pub health_risks: ProgramImage,
    pub strategies: ProgramImage,
    pub conclusion: ProgramImage,
}

impl ProgramImages {
    pub fn get(&self, slot: ImageSlot) -> &ProgramImage {
        match slot {
            ImageSlot::Main => &self.main,
            ImageSlot::MainContent => &self.main_content,
            ImageSlot::WhatCauses => &self.what_causes,
            ImageSlot::HealthRisks => &self.health_risks,
            ImageSlot::Strategies => &self.strategies,
            ImageSlot::Conclusion => &self.conclusion,
        }
    }

    /// Swaps in a new image and hands back the one it replaced.
    pub fn replace(&mut self, slot: ImageSlot, image: ProgramImage) -> ProgramImage {
        let target = match slot {
            ImageSlot::Main => &mut self.main,
            ImageSlot::MainContent => &mut self.main_content,
            ImageSlot::WhatCauses => &mut self.what_causes,
            ImageSlot::HealthRisks => &mut self.health_risks,
            ImageSlot::Strategies => &mut self.strategies,
            ImageSlot::Conclusion => &mut self.conclusion,
        };
        std::mem::replace(target, image)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImageSlot, &ProgramImage)> {
        ImageSlot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }

    pub fn public_ids(&self) -> Vec<String> {
        self.iter().map(|(_, image)| image.public_id.clone()).collect()
    }
}

impl From<[ProgramImage; 6]> for ProgramImages {
    fn from(images: [ProgramImage; 6]) -> Self {
        let [main, main_content, what_causes, health_risks, strategies, conclusion] = images;
        Self {
            main,
            main_content,
            what_causes,
            health_risks,
            strategies,
            conclusion,
        }
    }
}

/// The narrative text of a program page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramContent {
    pub name: String,
    pub short_description: String,
    pub intro_description: String,
    pub what_causes: String,
    pub health_risks: String,
    pub strategies: String,
    pub conclusion: String,
}

impl ProgramContent {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if self.short_description.trim().is_empty() {
            return Err(AppError::Validation("shortDescription is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: i32,
    #[serde(flatten)]
    pub content: ProgramContent,
    pub images: ProgramImages,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied fields of a pricing plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPlanSpec {
    pub name: String,
    #[serde(default)]
    pub subtitle: String,
    pub price: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl PricingPlanSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("pricing plan name is required".to_string()));
        }
        if self.price.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "pricing plan '{}' needs a price",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPlan {
    pub id: i32,
    pub program_id: i32,
    pub name: String,
    pub subtitle: String,
    pub price: String,
    pub features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A program together with its plans, as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramResponse {
    pub program: Program,
    pub pricing_plans: Vec<PricingPlan>,
}

/// An uploaded file held in memory until it is pushed to the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

pub type ImageUploads = HashMap<ImageSlot, ImageUpload>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: i32,
    pub name: String,
    pub location: String,
    pub review: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Admin {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A prospective customer's registration, forwarded by e-mail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub package: String,
}

impl CustomerDetails {
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(AppError::Validation("fullName is required".to_string()));
        }
        if !email_address::EmailAddress::is_valid(self.email.trim()) {
            return Err(AppError::Validation("a valid email is required".to_string()));
        }
        Ok(())
    }
}
