use std::sync::Arc;

use crate::api::{LoginResponse, UpdateProfileRequest};
use crate::auth::{hash_password, verify_password};
use crate::blob_store::BlobStore;
use crate::db::{AdminStore, ProgramStore, TestimonialStore};
use crate::email_sender::LeadNotifier;
use crate::error::{AppError, Result};
use crate::models::Admin;
use crate::payment::WebhookVerifier;
use crate::pricing_plans::PricingPlanManager;
use crate::program_manager::ProgramManager;
use crate::tokens::{TokenIssuer, TokenKind};

const MIN_PASSWORD_LEN: usize = 6;

/// Everything the request handlers share.
pub struct SiteStateManager {
    pub programs: ProgramManager,
    pub plans: PricingPlanManager,
    pub testimonials: Arc<dyn TestimonialStore>,
    pub admins: Arc<dyn AdminStore>,
    pub notifier: Arc<dyn LeadNotifier>,
    pub tokens: TokenIssuer,
    pub webhooks: WebhookVerifier,
}

/// Backing services for [`SiteStateManager::new`].
pub struct Services {
    pub programs: Arc<dyn ProgramStore>,
    pub testimonials: Arc<dyn TestimonialStore>,
    pub admins: Arc<dyn AdminStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub notifier: Arc<dyn LeadNotifier>,
}

impl SiteStateManager {
    pub fn new(services: Services, upload_folder: String, tokens: TokenIssuer, webhooks: WebhookVerifier) -> Self {
        Self {
            programs: ProgramManager::new(services.programs.clone(), services.blobs, upload_folder),
            plans: PricingPlanManager::new(services.programs),
            testimonials: services.testimonials,
            admins: services.admins,
            notifier: services.notifier,
            tokens,
            webhooks,
        }
    }

    pub async fn authenticate_admin(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let invalid = || AppError::Unauthorized("invalid email or password".to_string());

        let admin = self
            .admins
            .get_admin_by_email(email.trim())
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(password, &admin.password_hash)? {
            tracing::debug!("Password mismatch for {}", admin.email);
            return Err(invalid());
        }
        if !admin.is_active {
            return Err(AppError::Unauthorized("account is inactive".to_string()));
        }

        let token = self.tokens.issue(admin.id, &admin.email, TokenKind::Access)?;
        let refresh_token = self.tokens.issue(admin.id, &admin.email, TokenKind::Refresh)?;
        tracing::info!("Admin {} logged in", admin.id);
        Ok(LoginResponse {
            token,
            refresh_token,
            admin,
        })
    }

    /// Trades a refresh token for a new access token while the account stays active.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<String> {
        let claims = self.tokens.validate(refresh_token, TokenKind::Refresh)?;
        let admin = self.admins.get_admin(claims.admin_id()?).await.map_err(|_| {
            AppError::Unauthorized("invalid or expired token".to_string())
        })?;
        if !admin.is_active {
            return Err(AppError::Unauthorized("account is inactive".to_string()));
        }
        self.tokens.issue(admin.id, &admin.email, TokenKind::Access)
    }

    pub async fn admin_profile(&self, admin_id: i32) -> Result<Admin> {
        Ok(self.admins.get_admin(admin_id).await?)
    }

    pub async fn update_profile(&self, admin_id: i32, req: &UpdateProfileRequest) -> Result<Admin> {
        let full_name = req.full_name.trim();
        let email = req.email.trim();
        if full_name.is_empty() {
            return Err(AppError::Validation("full_name is required".to_string()));
        }
        if !email_address::EmailAddress::is_valid(email) {
            return Err(AppError::Validation("a valid email is required".to_string()));
        }
        Ok(self.admins.update_admin_profile(admin_id, full_name, email).await?)
    }

    pub async fn change_password(&self, admin_id: i32, current: &str, new: &str) -> Result<()> {
        if new.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "new password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let admin = self.admins.get_admin(admin_id).await?;
        if !verify_password(current, &admin.password_hash)? {
            return Err(AppError::Unauthorized("current password is incorrect".to_string()));
        }
        let password_hash = hash_password(new)?;
        self.admins.update_password_hash(admin_id, &password_hash).await?;
        tracing::info!("Admin {} changed password", admin_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryAdminStore, MemoryBlobStore, MemoryProgramStore, MemoryTestimonialStore, RecordingNotifier};

    fn state(admins: Arc<MemoryAdminStore>) -> SiteStateManager {
        SiteStateManager::new(
            Services {
                programs: MemoryProgramStore::new(),
                testimonials: Arc::new(MemoryTestimonialStore::default()),
                admins,
                blobs: MemoryBlobStore::new(),
                notifier: Arc::new(RecordingNotifier::default()),
            },
            "plantbased/programs".into(),
            TokenIssuer::new("test-secret", 24, 168),
            WebhookVerifier::new("sk_test"),
        )
    }

    #[tokio::test]
    async fn login_issues_both_tokens() {
        let state = state(MemoryAdminStore::with_admin("admin@plantbased.com", "secret123", true));
        let login = state.authenticate_admin("admin@plantbased.com", "secret123").await.unwrap();
        assert_eq!(login.admin.id, 1);
        assert!(state.tokens.validate(&login.token, TokenKind::Access).is_ok());
        assert!(state.tokens.validate(&login.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[tokio::test]
    async fn login_errors_do_not_reveal_which_part_was_wrong() {
        let state = state(MemoryAdminStore::with_admin("admin@plantbased.com", "secret123", true));
        for (email, password) in [("admin@plantbased.com", "nope"), ("who@plantbased.com", "secret123")] {
            match state.authenticate_admin(email, password).await {
                Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "invalid email or password"),
                other => panic!("unexpected {:?}", other.map(|r| r.admin.id)),
            }
        }
    }

    #[tokio::test]
    async fn inactive_admin_cannot_log_in() {
        let state = state(MemoryAdminStore::with_admin("admin@plantbased.com", "secret123", false));
        match state.authenticate_admin("admin@plantbased.com", "secret123").await {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "account is inactive"),
            other => panic!("unexpected {:?}", other.map(|r| r.admin.id)),
        }
    }

    #[tokio::test]
    async fn refresh_needs_a_refresh_token() {
        let state = state(MemoryAdminStore::with_admin("admin@plantbased.com", "secret123", true));
        let login = state.authenticate_admin("admin@plantbased.com", "secret123").await.unwrap();

        let access = state.refresh_token(&login.refresh_token).await.unwrap();
        assert!(state.tokens.validate(&access, TokenKind::Access).is_ok());
        assert!(state.refresh_token(&login.token).await.is_err());
    }

    #[tokio::test]
    async fn change_password_checks_current_and_length() {
        let admins = MemoryAdminStore::with_admin("admin@plantbased.com", "secret123", true);
        let state = state(admins.clone());

        assert!(matches!(
            state.change_password(1, "secret123", "short").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            state.change_password(1, "wrong", "longenough").await,
            Err(AppError::Unauthorized(_))
        ));
        state.change_password(1, "secret123", "longenough").await.unwrap();
        assert!(state.authenticate_admin("admin@plantbased.com", "longenough").await.is_ok());
        assert!(verify_password("longenough", &admins.admin(1).unwrap().password_hash).unwrap());
    }

    #[tokio::test]
    async fn profile_update_validates_email() {
        let state = state(MemoryAdminStore::with_admin("admin@plantbased.com", "secret123", true));
        let bad = UpdateProfileRequest {
            full_name: "Chief".into(),
            email: "nope".into(),
        };
        assert!(matches!(state.update_profile(1, &bad).await, Err(AppError::Validation(_))));

        let good = UpdateProfileRequest {
            full_name: " Chief Admin ".into(),
            email: "chief@plantbased.com".into(),
        };
        let admin = state.update_profile(1, &good).await.unwrap();
        assert_eq!(admin.full_name, "Chief Admin");
        assert_eq!(state.admin_profile(1).await.unwrap().email, "chief@plantbased.com");
    }
}
