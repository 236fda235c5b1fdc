use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use thiserror::Error;

use crate::api::TestimonialRequest;
use crate::models::{
    Admin, PricingPlan, PricingPlanSpec, Program, ProgramContent, ProgramImage, ProgramImages,
    Testimonial,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Programs and their pricing plans.
#[async_trait]
pub trait ProgramStore: Send + Sync {
    async fn insert_program(
        &self,
        content: &ProgramContent,
        images: &ProgramImages,
    ) -> StoreResult<Program>;

    async fn get_program(&self, id: i32) -> StoreResult<Program>;

    /// Newest first.
    async fn list_programs(&self) -> StoreResult<Vec<Program>>;

    /// Rewrites the row and, when `plans` is given, swaps the whole plan set in the same transaction.
    async fn update_program(
        &self,
        id: i32,
        content: &ProgramContent,
        images: &ProgramImages,
        plans: Option<&[PricingPlanSpec]>,
    ) -> StoreResult<Program>;

    /// Removes the row; plans go with it.
    async fn delete_program(&self, id: i32) -> StoreResult<()>;

    /// Inserts all plans or none of them.
    async fn insert_plans(
        &self,
        program_id: i32,
        plans: &[PricingPlanSpec],
    ) -> StoreResult<Vec<PricingPlan>>;

    /// Ascending id, i.e. insertion order.
    async fn list_plans(&self, program_id: i32) -> StoreResult<Vec<PricingPlan>>;

    async fn update_plan(
        &self,
        program_id: i32,
        plan_id: i32,
        plan: &PricingPlanSpec,
    ) -> StoreResult<PricingPlan>;

    async fn delete_plan(&self, program_id: i32, plan_id: i32) -> StoreResult<()>;
}

#[async_trait]
pub trait TestimonialStore: Send + Sync {
    async fn create_testimonial(&self, req: &TestimonialRequest) -> StoreResult<Testimonial>;
    async fn list_testimonials(&self) -> StoreResult<Vec<Testimonial>>;
    async fn get_testimonial(&self, id: i32) -> StoreResult<Testimonial>;
    async fn update_testimonial(&self, id: i32, req: &TestimonialRequest) -> StoreResult<Testimonial>;
    async fn delete_testimonial(&self, id: i32) -> StoreResult<()>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn get_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>>;
    async fn get_admin(&self, id: i32) -> StoreResult<Admin>;
    async fn update_admin_profile(&self, id: i32, full_name: &str, email: &str) -> StoreResult<Admin>;
    async fn update_password_hash(&self, id: i32, password_hash: &str) -> StoreResult<()>;
    /// Inserts the admin unless the e-mail is already taken; returns whether a row was added.
    async fn create_admin_if_absent(
        &self,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> StoreResult<bool>;
}

const PROGRAM_COLUMNS: &str = "id, name, short_description, main_image_public_id, main_image_url, \
    intro_description, main_content_image_public_id, main_content_image_url, \
    what_causes, what_causes_image_public_id, what_causes_image_url, \
    health_risks, health_risks_image_public_id, health_risks_image_url, \
    strategies, strategies_image_public_id, strategies_image_url, \
    conclusion, conclusion_image_public_id, conclusion_image_url, \
    created_at, updated_at";

const PLAN_COLUMNS: &str = "id, program_id, name, subtitle, price, features, created_at, updated_at";

const TESTIMONIAL_COLUMNS: &str = "id, name, location, review, avatar, created_at, updated_at";

const ADMIN_COLUMNS: &str = "id, email, password_hash, full_name, is_active, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ProgramRow {
    id: i32,
    name: String,
    short_description: String,
    main_image_public_id: String,
    main_image_url: String,
    intro_description: String,
    main_content_image_public_id: String,
    main_content_image_url: String,
    what_causes: String,
    what_causes_image_public_id: String,
    what_causes_image_url: String,
    health_risks: String,
    health_risks_image_public_id: String,
    health_risks_image_url: String,
    strategies: String,
    strategies_image_public_id: String,
    strategies_image_url: String,
    conclusion: String,
    conclusion_image_public_id: String,
    conclusion_image_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProgramRow> for Program {
    fn from(row: ProgramRow) -> Self {
        let image = |public_id: String, url: String| ProgramImage { public_id, url };
        Program {
            id: row.id,
            content: ProgramContent {
                name: row.name,
                short_description: row.short_description,
                intro_description: row.intro_description,
                what_causes: row.what_causes,
                health_risks: row.health_risks,
                strategies: row.strategies,
                conclusion: row.conclusion,
            },
            images: ProgramImages {
                main: image(row.main_image_public_id, row.main_image_url),
                main_content: image(row.main_content_image_public_id, row.main_content_image_url),
                what_causes: image(row.what_causes_image_public_id, row.what_causes_image_url),
                health_risks: image(row.health_risks_image_public_id, row.health_risks_image_url),
                strategies: image(row.strategies_image_public_id, row.strategies_image_url),
                conclusion: image(row.conclusion_image_public_id, row.conclusion_image_url),
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PlanRow {
    id: i32,
    program_id: i32,
    name: String,
    subtitle: String,
    price: String,
    features: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlanRow> for PricingPlan {
    fn from(row: PlanRow) -> Self {
        PricingPlan {
            id: row.id,
            program_id: row.program_id,
            name: row.name,
            subtitle: row.subtitle,
            price: row.price,
            features: row.features.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TestimonialRow {
    id: i32,
    name: String,
    location: String,
    review: String,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TestimonialRow> for Testimonial {
    fn from(row: TestimonialRow) -> Self {
        Testimonial {
            id: row.id,
            name: row.name,
            location: row.location,
            review: row.review,
            avatar: row.avatar,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AdminRow {
    id: i32,
    email: String,
    password_hash: String,
    full_name: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AdminRow> for Admin {
    fn from(row: AdminRow) -> Self {
        Admin {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name.unwrap_or_default(),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgConnector {
    pool: PgPool,
}

impl PgConnector {
    pub async fn new(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!("Connected to Postgres (pool size {})", max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_plan<'e, E>(executor: E, program_id: i32, plan: &PricingPlanSpec) -> StoreResult<PricingPlan>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row: PlanRow = sqlx::query_as(&format!(
            "INSERT INTO program_pricing_plans (program_id, name, subtitle, price, features) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PLAN_COLUMNS
        ))
        .bind(program_id)
        .bind(&plan.name)
        .bind(&plan.subtitle)
        .bind(&plan.price)
        .bind(Json(&plan.features))
        .fetch_one(executor)
        .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl ProgramStore for PgConnector {
    async fn insert_program(
        &self,
        content: &ProgramContent,
        images: &ProgramImages,
    ) -> StoreResult<Program> {
        let row: ProgramRow = sqlx::query_as(&format!(
            "INSERT INTO programs ( \
                name, short_description, main_image_public_id, main_image_url, \
                intro_description, main_content_image_public_id, main_content_image_url, \
                what_causes, what_causes_image_public_id, what_causes_image_url, \
                health_risks, health_risks_image_public_id, health_risks_image_url, \
                strategies, strategies_image_public_id, strategies_image_url, \
                conclusion, conclusion_image_public_id, conclusion_image_url \
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) \
             RETURNING {}",
            PROGRAM_COLUMNS
        ))
        .bind(&content.name)
        .bind(&content.short_description)
        .bind(&images.main.public_id)
        .bind(&images.main.url)
        .bind(&content.intro_description)
        .bind(&images.main_content.public_id)
        .bind(&images.main_content.url)
        .bind(&content.what_causes)
        .bind(&images.what_causes.public_id)
        .bind(&images.what_causes.url)
        .bind(&content.health_risks)
        .bind(&images.health_risks.public_id)
        .bind(&images.health_risks.url)
        .bind(&content.strategies)
        .bind(&images.strategies.public_id)
        .bind(&images.strategies.url)
        .bind(&content.conclusion)
        .bind(&images.conclusion.public_id)
        .bind(&images.conclusion.url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_program(&self, id: i32) -> StoreResult<Program> {
        let row: Option<ProgramRow> =
            sqlx::query_as(&format!("SELECT {} FROM programs WHERE id = $1", PROGRAM_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Program::from)
            .ok_or_else(|| StoreError::NotFound(format!("Program {}", id)))
    }

    async fn list_programs(&self) -> StoreResult<Vec<Program>> {
        let rows: Vec<ProgramRow> = sqlx::query_as(&format!(
            "SELECT {} FROM programs ORDER BY created_at DESC, id DESC",
            PROGRAM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Program::from).collect())
    }

    async fn update_program(
        &self,
        id: i32,
        content: &ProgramContent,
        images: &ProgramImages,
        plans: Option<&[PricingPlanSpec]>,
    ) -> StoreResult<Program> {
        let mut tx = self.pool.begin().await?;

        let row: Option<ProgramRow> = sqlx::query_as(&format!(
            "UPDATE programs SET \
                name = $1, short_description = $2, main_image_public_id = $3, main_image_url = $4, \
                intro_description = $5, main_content_image_public_id = $6, main_content_image_url = $7, \
                what_causes = $8, what_causes_image_public_id = $9, what_causes_image_url = $10, \
                health_risks = $11, health_risks_image_public_id = $12, health_risks_image_url = $13, \
                strategies = $14, strategies_image_public_id = $15, strategies_image_url = $16, \
                conclusion = $17, conclusion_image_public_id = $18, conclusion_image_url = $19, \
                updated_at = NOW() \
             WHERE id = $20 RETURNING {}",
            PROGRAM_COLUMNS
        ))
        .bind(&content.name)
        .bind(&content.short_description)
        .bind(&images.main.public_id)
        .bind(&images.main.url)
        .bind(&content.intro_description)
        .bind(&images.main_content.public_id)
        .bind(&images.main_content.url)
        .bind(&content.what_causes)
        .bind(&images.what_causes.public_id)
        .bind(&images.what_causes.url)
        .bind(&content.health_risks)
        .bind(&images.health_risks.public_id)
        .bind(&images.health_risks.url)
        .bind(&content.strategies)
        .bind(&images.strategies.public_id)
        .bind(&images.strategies.url)
        .bind(&content.conclusion)
        .bind(&images.conclusion.public_id)
        .bind(&images.conclusion.url)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction without commit rolls it back.
        let program = row
            .map(Program::from)
            .ok_or_else(|| StoreError::NotFound(format!("Program {}", id)))?;

        if let Some(plans) = plans {
            sqlx::query("DELETE FROM program_pricing_plans WHERE program_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for plan in plans {
                Self::insert_plan(&mut *tx, id, plan).await?;
            }
        }

        tx.commit().await?;
        Ok(program)
    }

    async fn delete_program(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM programs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Program {}", id)));
        }
        Ok(())
    }

    async fn insert_plans(
        &self,
        program_id: i32,
        plans: &[PricingPlanSpec],
    ) -> StoreResult<Vec<PricingPlan>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(plans.len());
        for plan in plans {
            inserted.push(Self::insert_plan(&mut *tx, program_id, plan).await?);
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_plans(&self, program_id: i32) -> StoreResult<Vec<PricingPlan>> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "SELECT {} FROM program_pricing_plans WHERE program_id = $1 ORDER BY id ASC",
            PLAN_COLUMNS
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PricingPlan::from).collect())
    }

    async fn update_plan(
        &self,
        program_id: i32,
        plan_id: i32,
        plan: &PricingPlanSpec,
    ) -> StoreResult<PricingPlan> {
        let row: Option<PlanRow> = sqlx::query_as(&format!(
            "UPDATE program_pricing_plans \
             SET name = $1, subtitle = $2, price = $3, features = $4, updated_at = NOW() \
             WHERE id = $5 AND program_id = $6 RETURNING {}",
            PLAN_COLUMNS
        ))
        .bind(&plan.name)
        .bind(&plan.subtitle)
        .bind(&plan.price)
        .bind(Json(&plan.features))
        .bind(plan_id)
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PricingPlan::from).ok_or_else(|| {
            StoreError::NotFound(format!("Pricing plan {} of program {}", plan_id, program_id))
        })
    }

    async fn delete_plan(&self, program_id: i32, plan_id: i32) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM program_pricing_plans WHERE id = $1 AND program_id = $2")
                .bind(plan_id)
                .bind(program_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "Pricing plan {} of program {}",
                plan_id, program_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TestimonialStore for PgConnector {
    async fn create_testimonial(&self, req: &TestimonialRequest) -> StoreResult<Testimonial> {
        let row: TestimonialRow = sqlx::query_as(&format!(
            "INSERT INTO testimonials (name, location, review, avatar) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            TESTIMONIAL_COLUMNS
        ))
        .bind(&req.name)
        .bind(&req.location)
        .bind(&req.review)
        .bind(&req.avatar)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_testimonials(&self) -> StoreResult<Vec<Testimonial>> {
        let rows: Vec<TestimonialRow> = sqlx::query_as(&format!(
            "SELECT {} FROM testimonials ORDER BY created_at DESC, id DESC",
            TESTIMONIAL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Testimonial::from).collect())
    }

    async fn get_testimonial(&self, id: i32) -> StoreResult<Testimonial> {
        let row: Option<TestimonialRow> = sqlx::query_as(&format!(
            "SELECT {} FROM testimonials WHERE id = $1",
            TESTIMONIAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Testimonial::from)
            .ok_or_else(|| StoreError::NotFound(format!("Testimonial {}", id)))
    }

    async fn update_testimonial(&self, id: i32, req: &TestimonialRequest) -> StoreResult<Testimonial> {
        let row: Option<TestimonialRow> = sqlx::query_as(&format!(
            "UPDATE testimonials \
             SET name = $1, location = $2, review = $3, avatar = $4, updated_at = NOW() \
             WHERE id = $5 RETURNING {}",
            TESTIMONIAL_COLUMNS
        ))
        .bind(&req.name)
        .bind(&req.location)
        .bind(&req.review)
        .bind(&req.avatar)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Testimonial::from)
            .ok_or_else(|| StoreError::NotFound(format!("Testimonial {}", id)))
    }

    async fn delete_testimonial(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM testimonials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Testimonial {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AdminStore for PgConnector {
    async fn get_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        let row: Option<AdminRow> =
            sqlx::query_as(&format!("SELECT {} FROM admins WHERE email = $1", ADMIN_COLUMNS))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Admin::from))
    }

    async fn get_admin(&self, id: i32) -> StoreResult<Admin> {
        let row: Option<AdminRow> =
            sqlx::query_as(&format!("SELECT {} FROM admins WHERE id = $1", ADMIN_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Admin::from)
            .ok_or_else(|| StoreError::NotFound(format!("Admin {}", id)))
    }

    async fn update_admin_profile(&self, id: i32, full_name: &str, email: &str) -> StoreResult<Admin> {
        let row: Option<AdminRow> = sqlx::query_as(&format!(
            "UPDATE admins SET full_name = $1, email = $2, updated_at = NOW() \
             WHERE id = $3 RETURNING {}",
            ADMIN_COLUMNS
        ))
        .bind(full_name)
        .bind(email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Admin::from)
            .ok_or_else(|| StoreError::NotFound(format!("Admin {}", id)))
    }

    async fn update_password_hash(&self, id: i32, password_hash: &str) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE admins SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Admin {}", id)));
        }
        Ok(())
    }

    async fn create_admin_if_absent(
        &self,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO admins (email, password_hash, full_name, is_active) \
             VALUES ($1, $2, $3, true) ON CONFLICT (email) DO NOTHING",
        )
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
