use std::slice;
use std::sync::Arc;

use crate::db::ProgramStore;
use crate::error::{AppError, Result};
use crate::models::{PricingPlan, PricingPlanSpec};

/// Per-plan edits on an existing program. Plans are addressed by the
/// (program, plan) pair; a plan id under the wrong program is not found.
pub struct PricingPlanManager {
    store: Arc<dyn ProgramStore>,
}

impl PricingPlanManager {
    pub fn new(store: Arc<dyn ProgramStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, program_id: i32, spec: PricingPlanSpec) -> Result<PricingPlan> {
        spec.validate()?;
        self.store.get_program(program_id).await?;
        let mut inserted = self
            .store
            .insert_plans(program_id, slice::from_ref(&spec))
            .await?;
        inserted
            .pop()
            .ok_or_else(|| AppError::Internal("plan insert returned no row".to_string()))
    }

    pub async fn list(&self, program_id: i32) -> Result<Vec<PricingPlan>> {
        self.store.get_program(program_id).await?;
        Ok(self.store.list_plans(program_id).await?)
    }

    pub async fn update(&self, program_id: i32, plan_id: i32, spec: PricingPlanSpec) -> Result<PricingPlan> {
        spec.validate()?;
        Ok(self.store.update_plan(program_id, plan_id, &spec).await?)
    }

    pub async fn delete(&self, program_id: i32, plan_id: i32) -> Result<()> {
        self.store.delete_plan(program_id, plan_id).await?;
        tracing::info!("Deleted pricing plan {} of program {}", plan_id, program_id);
        Ok(())
    }
}
