//! In-memory stand-ins for the database, the blob store and the mailer.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::TestimonialRequest;
use crate::auth::hash_password;
use crate::blob_store::{BlobError, BlobStore};
use crate::db::{AdminStore, ProgramStore, StoreError, StoreResult, TestimonialStore};
use crate::email_sender::LeadNotifier;
use crate::error::{AppError, Result};
use crate::models::{
    Admin, CustomerDetails, ImageSlot, ImageUpload, ImageUploads, PricingPlan, PricingPlanSpec,
    Program, ProgramContent, ProgramImage, ProgramImages, Testimonial,
};

fn db_down() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

// Deterministic clock so "newest first" is well defined
fn stamp(seq: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default() + Duration::seconds(seq as i64)
}

pub fn content(name: &str) -> ProgramContent {
    ProgramContent {
        name: name.to_string(),
        short_description: format!("{} in twelve weeks", name),
        intro_description: "Intro".into(),
        what_causes: "Causes".into(),
        health_risks: "Risks".into(),
        strategies: "Strategies".into(),
        conclusion: "Conclusion".into(),
    }
}

pub fn upload(tag: &str) -> ImageUpload {
    ImageUpload {
        file_name: format!("{}.png", tag),
        content_type: Some("image/png".into()),
        data: tag.as_bytes().to_vec(),
    }
}

pub fn all_uploads() -> ImageUploads {
    ImageSlot::ALL
        .into_iter()
        .map(|slot| (slot, upload(slot.form_field())))
        .collect()
}

pub fn plan(name: &str, price: &str) -> PricingPlanSpec {
    PricingPlanSpec {
        name: name.to_string(),
        subtitle: String::new(),
        price: price.to_string(),
        features: vec![format!("{} feature", name)],
    }
}

#[derive(Default)]
struct ProgramTables {
    programs: BTreeMap<i32, Program>,
    plans: BTreeMap<i32, PricingPlan>,
    next_program_id: i32,
    next_plan_id: i32,
    clock: i32,
}

impl ProgramTables {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        stamp(self.clock)
    }

    fn build_plan(&mut self, program_id: i32, spec: &PricingPlanSpec) -> PricingPlan {
        self.next_plan_id += 1;
        let now = self.tick();
        PricingPlan {
            id: self.next_plan_id,
            program_id,
            name: spec.name.clone(),
            subtitle: spec.subtitle.clone(),
            price: spec.price.clone(),
            features: spec.features.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Switches that make the next matching store call fail with a database error.
#[derive(Default)]
pub struct StoreFaults {
    pub insert_program: AtomicBool,
    pub insert_plans: AtomicBool,
    pub update_program: AtomicBool,
    pub delete_program: AtomicBool,
}

#[derive(Default)]
pub struct MemoryProgramStore {
    tables: Mutex<ProgramTables>,
    pub faults: StoreFaults,
}

impl MemoryProgramStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn program_count(&self) -> usize {
        self.tables.lock().unwrap().programs.len()
    }

    pub fn plan_count(&self) -> usize {
        self.tables.lock().unwrap().plans.len()
    }

    pub fn stored_program(&self, id: i32) -> Option<Program> {
        self.tables.lock().unwrap().programs.get(&id).cloned()
    }

    fn fail(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgramStore for MemoryProgramStore {
    async fn insert_program(
        &self,
        content: &ProgramContent,
        images: &ProgramImages,
    ) -> StoreResult<Program> {
        if Self::fail(&self.faults.insert_program) {
            return Err(db_down());
        }
        let mut tables = self.tables.lock().unwrap();
        tables.next_program_id += 1;
        let now = tables.tick();
        let program = Program {
            id: tables.next_program_id,
            content: content.clone(),
            images: images.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.programs.insert(program.id, program.clone());
        Ok(program)
    }

    async fn get_program(&self, id: i32) -> StoreResult<Program> {
        self.stored_program(id)
            .ok_or_else(|| StoreError::NotFound(format!("Program {}", id)))
    }

    async fn list_programs(&self) -> StoreResult<Vec<Program>> {
        let tables = self.tables.lock().unwrap();
        let mut programs: Vec<Program> = tables.programs.values().cloned().collect();
        programs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(programs)
    }

    async fn update_program(
        &self,
        id: i32,
        content: &ProgramContent,
        images: &ProgramImages,
        plans: Option<&[PricingPlanSpec]>,
    ) -> StoreResult<Program> {
        if Self::fail(&self.faults.update_program) {
            return Err(db_down());
        }
        let mut tables = self.tables.lock().unwrap();
        if !tables.programs.contains_key(&id) {
            return Err(StoreError::NotFound(format!("Program {}", id)));
        }
        let now = tables.tick();
        if let Some(plans) = plans {
            tables.plans.retain(|_, plan| plan.program_id != id);
            for spec in plans {
                let plan = tables.build_plan(id, spec);
                tables.plans.insert(plan.id, plan);
            }
        }
        let program = tables
            .programs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Program {}", id)))?;
        program.content = content.clone();
        program.images = images.clone();
        program.updated_at = now;
        Ok(program.clone())
    }

    async fn delete_program(&self, id: i32) -> StoreResult<()> {
        if Self::fail(&self.faults.delete_program) {
            return Err(db_down());
        }
        let mut tables = self.tables.lock().unwrap();
        if tables.programs.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("Program {}", id)));
        }
        tables.plans.retain(|_, plan| plan.program_id != id);
        Ok(())
    }

    async fn insert_plans(
        &self,
        program_id: i32,
        plans: &[PricingPlanSpec],
    ) -> StoreResult<Vec<PricingPlan>> {
        if Self::fail(&self.faults.insert_plans) {
            return Err(db_down());
        }
        let mut tables = self.tables.lock().unwrap();
        if !tables.programs.contains_key(&program_id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "foreign key violation".into(),
            )));
        }
        let mut inserted = Vec::with_capacity(plans.len());
        for spec in plans {
            let plan = tables.build_plan(program_id, spec);
            tables.plans.insert(plan.id, plan.clone());
            inserted.push(plan);
        }
        Ok(inserted)
    }

    async fn list_plans(&self, program_id: i32) -> StoreResult<Vec<PricingPlan>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .plans
            .values()
            .filter(|plan| plan.program_id == program_id)
            .cloned()
            .collect())
    }

    async fn update_plan(
        &self,
        program_id: i32,
        plan_id: i32,
        spec: &PricingPlanSpec,
    ) -> StoreResult<PricingPlan> {
        let mut tables = self.tables.lock().unwrap();
        let now = tables.tick();
        match tables.plans.get_mut(&plan_id) {
            Some(plan) if plan.program_id == program_id => {
                plan.name = spec.name.clone();
                plan.subtitle = spec.subtitle.clone();
                plan.price = spec.price.clone();
                plan.features = spec.features.clone();
                plan.updated_at = now;
                Ok(plan.clone())
            }
            _ => Err(StoreError::NotFound(format!(
                "Pricing plan {} of program {}",
                plan_id, program_id
            ))),
        }
    }

    async fn delete_plan(&self, program_id: i32, plan_id: i32) -> StoreResult<()> {
        let mut tables = self.tables.lock().unwrap();
        match tables.plans.get(&plan_id) {
            Some(plan) if plan.program_id == program_id => {
                tables.plans.remove(&plan_id);
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!(
                "Pricing plan {} of program {}",
                plan_id, program_id
            ))),
        }
    }
}

#[derive(Default)]
struct BlobLedger {
    upload_calls: usize,
    next_id: usize,
    stored: Vec<String>,
    deleted: Vec<String>,
    fail_upload_call: Option<usize>,
    fail_deletes: bool,
}

/// Records every upload and delete; can be told to fail the n-th upload.
#[derive(Default)]
pub struct MemoryBlobStore {
    ledger: Mutex<BlobLedger>,
}

impl MemoryBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 1-based: `fail_upload_on(3)` makes the third upload call fail.
    pub fn fail_upload_on(&self, call: usize) {
        self.ledger.lock().unwrap().fail_upload_call = Some(call);
    }

    pub fn fail_deletes(&self) {
        self.ledger.lock().unwrap().fail_deletes = true;
    }

    pub fn stored(&self) -> Vec<String> {
        self.ledger.lock().unwrap().stored.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.ledger.lock().unwrap().deleted.clone()
    }

    pub fn upload_calls(&self) -> usize {
        self.ledger.lock().unwrap().upload_calls
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, image: &ImageUpload, folder: &str) -> std::result::Result<ProgramImage, BlobError> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.upload_calls += 1;
        if ledger.fail_upload_call == Some(ledger.upload_calls) {
            return Err(BlobError::Rejected {
                status: 500,
                body: format!("cannot store {}", image.file_name),
            });
        }
        ledger.next_id += 1;
        let public_id = format!("{}/blob-{}", folder, ledger.next_id);
        ledger.stored.push(public_id.clone());
        Ok(ProgramImage {
            url: format!("https://blobs.test/{}", public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> std::result::Result<(), BlobError> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.deleted.push(public_id.to_string());
        if ledger.fail_deletes {
            return Err(BlobError::Unexpected("delete refused".into()));
        }
        ledger.stored.retain(|id| id != public_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTestimonialStore {
    rows: Mutex<(i32, BTreeMap<i32, Testimonial>)>,
}

#[async_trait]
impl TestimonialStore for MemoryTestimonialStore {
    async fn create_testimonial(&self, req: &TestimonialRequest) -> StoreResult<Testimonial> {
        let mut rows = self.rows.lock().unwrap();
        rows.0 += 1;
        let testimonial = Testimonial {
            id: rows.0,
            name: req.name.clone(),
            location: req.location.clone(),
            review: req.review.clone(),
            avatar: req.avatar.clone(),
            created_at: stamp(rows.0),
            updated_at: stamp(rows.0),
        };
        rows.1.insert(testimonial.id, testimonial.clone());
        Ok(testimonial)
    }

    async fn list_testimonials(&self) -> StoreResult<Vec<Testimonial>> {
        Ok(self.rows.lock().unwrap().1.values().rev().cloned().collect())
    }

    async fn get_testimonial(&self, id: i32) -> StoreResult<Testimonial> {
        self.rows
            .lock()
            .unwrap()
            .1
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Testimonial {}", id)))
    }

    async fn update_testimonial(&self, id: i32, req: &TestimonialRequest) -> StoreResult<Testimonial> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .1
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Testimonial {}", id)))?;
        row.name = req.name.clone();
        row.location = req.location.clone();
        row.review = req.review.clone();
        row.avatar = req.avatar.clone();
        Ok(row.clone())
    }

    async fn delete_testimonial(&self, id: i32) -> StoreResult<()> {
        self.rows
            .lock()
            .unwrap()
            .1
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Testimonial {}", id)))
    }
}

#[derive(Default)]
pub struct MemoryAdminStore {
    admins: Mutex<Vec<Admin>>,
}

impl MemoryAdminStore {
    /// A store holding one admin with the given credentials.
    pub fn with_admin(email: &str, password: &str, is_active: bool) -> Arc<Self> {
        let store = Self::default();
        store.admins.lock().unwrap().push(Admin {
            id: 1,
            email: email.to_string(),
            password_hash: hash_password(password).unwrap(),
            full_name: "System Administrator".into(),
            is_active,
            created_at: stamp(0),
            updated_at: stamp(0),
        });
        Arc::new(store)
    }

    pub fn admin(&self, id: i32) -> Option<Admin> {
        self.admins.lock().unwrap().iter().find(|a| a.id == id).cloned()
    }
}

#[async_trait]
impl AdminStore for MemoryAdminStore {
    async fn get_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        Ok(self.admins.lock().unwrap().iter().find(|a| a.email == email).cloned())
    }

    async fn get_admin(&self, id: i32) -> StoreResult<Admin> {
        self.admin(id)
            .ok_or_else(|| StoreError::NotFound(format!("Admin {}", id)))
    }

    async fn update_admin_profile(&self, id: i32, full_name: &str, email: &str) -> StoreResult<Admin> {
        let mut admins = self.admins.lock().unwrap();
        let admin = admins
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Admin {}", id)))?;
        admin.full_name = full_name.to_string();
        admin.email = email.to_string();
        Ok(admin.clone())
    }

    async fn update_password_hash(&self, id: i32, password_hash: &str) -> StoreResult<()> {
        let mut admins = self.admins.lock().unwrap();
        let admin = admins
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Admin {}", id)))?;
        admin.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn create_admin_if_absent(
        &self,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> StoreResult<bool> {
        let mut admins = self.admins.lock().unwrap();
        if admins.iter().any(|a| a.email == email) {
            return Ok(false);
        }
        let id = admins.len() as i32 + 1;
        admins.push(Admin {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            full_name: full_name.to_string(),
            is_active: true,
            created_at: stamp(id),
            updated_at: stamp(id),
        });
        Ok(true)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<CustomerDetails>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<CustomerDetails> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeadNotifier for RecordingNotifier {
    async fn send_customer_details(&self, details: &CustomerDetails) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Email("smtp unavailable".into()));
        }
        self.sent.lock().unwrap().push(details.clone());
        Ok(())
    }
}
