use std::sync::Arc;
use tracing::{error, info, warn};

use crate::blob_store::BlobStore;
use crate::db::{ProgramStore, StoreError};
use crate::error::{AppError, Result, TraceErr};
use crate::models::{
    ImageSlot, ImageUploads, PricingPlanSpec, ProgramContent, ProgramImage, ProgramImages,
    ProgramResponse,
};

fn validate_plans(plans: &[PricingPlanSpec]) -> Result<()> {
    plans.iter().try_for_each(PricingPlanSpec::validate)
}

/// Keeps program rows, their plans and their six stored images in step.
///
/// Every write path uploads first and persists second. When a later step
/// fails the blobs created by the earlier steps are deleted again, so a
/// failed request leaves neither rows nor orphaned images behind.
pub struct ProgramManager {
    store: Arc<dyn ProgramStore>,
    blobs: Arc<dyn BlobStore>,
    folder: String,
}

impl ProgramManager {
    pub fn new(store: Arc<dyn ProgramStore>, blobs: Arc<dyn BlobStore>, folder: impl Into<String>) -> Self {
        Self {
            store,
            blobs,
            folder: folder.into(),
        }
    }

    pub async fn create(
        &self,
        content: ProgramContent,
        mut images: ImageUploads,
        plans: Vec<PricingPlanSpec>,
    ) -> Result<ProgramResponse> {
        content.validate()?;
        validate_plans(&plans)?;
        let uploads = ImageSlot::ALL
            .into_iter()
            .map(|slot| {
                images.remove(&slot).map(|upload| (slot, upload)).ok_or_else(|| {
                    AppError::Validation(format!("{} is required", slot.form_field()))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut uploaded: Vec<ProgramImage> = Vec::with_capacity(uploads.len());
        for (slot, upload) in &uploads {
            match self.blobs.upload(upload, &self.folder).await {
                Ok(image) => uploaded.push(image),
                Err(source) => {
                    error!("Upload of {} image failed: {}", slot, source);
                    let ids: Vec<String> = uploaded.into_iter().map(|i| i.public_id).collect();
                    self.discard_blobs(&ids).await;
                    return Err(AppError::UploadFailed { slot: *slot, source });
                }
            }
        }
        let images: [ProgramImage; 6] = uploaded
            .try_into()
            .map_err(|_| AppError::Internal("expected six uploaded images".to_string()))?;
        let images = ProgramImages::from(images);

        let program = match self.store.insert_program(&content, &images).await {
            Ok(program) => program,
            Err(e) => {
                error!("Program insert failed, discarding uploads: {}", e);
                self.discard_blobs(&images.public_ids()).await;
                return Err(AppError::PersistFailed(e));
            }
        };

        let pricing_plans = if plans.is_empty() {
            Vec::new()
        } else {
            match self.store.insert_plans(program.id, &plans).await {
                Ok(inserted) => inserted,
                Err(e) => {
                    error!("Pricing plans for program {} failed, rolling back: {}", program.id, e);
                    // A surviving row still references the blobs, so they stay with it
                    match self.store.delete_program(program.id).await {
                        Ok(()) => self.discard_blobs(&images.public_ids()).await,
                        Err(cleanup) => warn!(
                            "Could not remove program {} after plan failure, keeping its images: {}",
                            program.id, cleanup
                        ),
                    }
                    return Err(AppError::PlanPersistFailed(e));
                }
            }
        };

        info!("Created program {} with {} pricing plans", program.id, pricing_plans.len());
        Ok(ProgramResponse {
            program,
            pricing_plans,
        })
    }

    /// Rewrites the text, swaps any supplied images and, given a non-empty
    /// list, replaces the plan set. Replaced blobs are removed only once the
    /// new state is committed.
    pub async fn update(
        &self,
        id: i32,
        content: ProgramContent,
        mut images: ImageUploads,
        plans: Option<Vec<PricingPlanSpec>>,
    ) -> Result<ProgramResponse> {
        content.validate()?;
        let plans = plans.filter(|plans| !plans.is_empty());
        if let Some(plans) = &plans {
            validate_plans(plans)?;
        }

        let existing = self.store.get_program(id).await?;
        let mut next_images = existing.images;
        let mut fresh: Vec<String> = Vec::new();
        let mut replaced: Vec<String> = Vec::new();

        for slot in ImageSlot::ALL {
            let Some(upload) = images.remove(&slot) else {
                continue;
            };
            match self.blobs.upload(&upload, &self.folder).await {
                Ok(image) => {
                    fresh.push(image.public_id.clone());
                    replaced.push(next_images.replace(slot, image).public_id);
                }
                Err(source) => {
                    error!("Upload of {} image for program {} failed: {}", slot, id, source);
                    self.discard_blobs(&fresh).await;
                    return Err(AppError::UploadFailed { slot, source });
                }
            }
        }

        let program = match self
            .store
            .update_program(id, &content, &next_images, plans.as_deref())
            .await
        {
            Ok(program) => program,
            Err(e) => {
                self.discard_blobs(&fresh).await;
                return Err(match e {
                    StoreError::NotFound(what) => AppError::NotFound(what),
                    other => {
                        error!("Update of program {} failed: {}", id, other);
                        AppError::PersistFailed(other)
                    }
                });
            }
        };

        self.discard_blobs(&replaced).await;
        let pricing_plans = self.store.list_plans(id).await?;
        info!("Updated program {} ({} images replaced)", id, replaced.len());
        Ok(ProgramResponse {
            program,
            pricing_plans,
        })
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        let program = self.store.get_program(id).await?;
        self.store.delete_program(id).await.trace_err("deleting program row")?;
        self.discard_blobs(&program.images.public_ids()).await;
        info!("Deleted program {}", id);
        Ok(())
    }

    pub async fn get(&self, id: i32) -> Result<ProgramResponse> {
        let program = self.store.get_program(id).await?;
        let pricing_plans = self.store.list_plans(id).await?;
        Ok(ProgramResponse {
            program,
            pricing_plans,
        })
    }

    pub async fn list(&self) -> Result<Vec<ProgramResponse>> {
        let programs = self.store.list_programs().await.trace_err("listing programs")?;
        let mut listed = Vec::with_capacity(programs.len());
        for program in programs {
            let pricing_plans = self.store.list_plans(program.id).await?;
            listed.push(ProgramResponse {
                program,
                pricing_plans,
            });
        }
        Ok(listed)
    }

    // Best effort: a failed delete only leaves an orphaned blob behind
    async fn discard_blobs(&self, public_ids: &[String]) {
        for public_id in public_ids {
            if let Err(e) = self.blobs.delete(public_id).await {
                warn!("Failed to delete blob {}: {}", public_id, e);
            }
        }
    }
}
