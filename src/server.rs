pub mod handlers {
    use actix_multipart::Multipart;
    use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
    use futures_util::StreamExt;
    use serde_json::json;
    use std::collections::HashMap;

    use crate::api::{
        ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RefreshTokenResponse,
        SuccessResponse, TestimonialRequest, UpdateProfileRequest, WebhookAck,
    };
    use crate::auth::LoggedAdmin;
    use crate::error::{AppError, Result as AppResult, TraceErr};
    use crate::models::{
        CustomerDetails, ImageSlot, ImageUpload, ImageUploads, PricingPlanSpec, ProgramContent,
    };
    use crate::payment::SIGNATURE_HEADER;
    use crate::state::SiteStateManager;

    pub const MAX_FORM_BYTES: usize = 32 * 1024 * 1024;

    type State = web::Data<SiteStateManager>;

    /// Text fields and image files of a program form.
    #[derive(Default)]
    pub struct ProgramForm {
        fields: HashMap<String, String>,
        images: ImageUploads,
    }

    impl ProgramForm {
        pub async fn read(mut payload: Multipart) -> AppResult<Self> {
            let mut form = ProgramForm::default();
            let mut total = 0usize;

            while let Some(item) = payload.next().await {
                let mut field =
                    item.map_err(|e| AppError::Validation(format!("invalid form data: {}", e)))?;
                let name = field.name().unwrap_or_default().to_string();
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string);
                let content_type = field.content_type().map(|mime| mime.to_string());

                let mut data = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk
                        .map_err(|e| AppError::Validation(format!("invalid form data: {}", e)))?;
                    total += chunk.len();
                    if total > MAX_FORM_BYTES {
                        return Err(AppError::Validation("form data exceeds 32 MiB".to_string()));
                    }
                    data.extend_from_slice(&chunk);
                }

                match ImageSlot::from_form_field(&name) {
                    // Browsers send an empty part for an untouched file input
                    Some(_) if data.is_empty() => {}
                    Some(slot) => {
                        form.images.insert(
                            slot,
                            ImageUpload {
                                file_name: file_name.unwrap_or_else(|| slot.form_field().to_string()),
                                content_type,
                                data,
                            },
                        );
                    }
                    None => {
                        let text = String::from_utf8(data).map_err(|_| {
                            AppError::Validation(format!("field {} is not valid UTF-8", name))
                        })?;
                        form.fields.insert(name, text);
                    }
                }
            }
            Ok(form)
        }

        fn text(&self, key: &str) -> String {
            self.fields.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
        }

        pub fn content(&self) -> ProgramContent {
            ProgramContent {
                name: self.text("name"),
                short_description: self.text("shortDescription"),
                intro_description: self.text("introDescription"),
                what_causes: self.text("whatCauses"),
                health_risks: self.text("healthRisks"),
                strategies: self.text("strategies"),
                conclusion: self.text("conclusion"),
            }
        }

        pub fn plans(&self) -> AppResult<Option<Vec<PricingPlanSpec>>> {
            match self.fields.get("pricingPlans").map(|raw| raw.trim()) {
                None | Some("") => Ok(None),
                Some(raw) => serde_json::from_str(raw)
                    .map(Some)
                    .map_err(|e| AppError::Validation(format!("invalid pricingPlans: {}", e))),
            }
        }

        pub fn into_images(self) -> ImageUploads {
            self.images
        }
    }

    /// Mounts every route on `cfg`.
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
            AppError::Validation(format!("invalid JSON body: {}", err)).into()
        }))
        .app_data(web::PathConfig::default().error_handler(|err, _| {
            AppError::Validation(format!("invalid path parameter: {}", err)).into()
        }))
        .service(health)
        .service(login)
        .service(refresh)
        .service(get_profile)
        .service(update_profile)
        .service(change_password)
        .service(list_programs)
        .service(get_program)
        .service(create_program)
        .service(update_program)
        .service(delete_program)
        .service(list_pricing_plans)
        .service(add_pricing_plan)
        .service(update_pricing_plan)
        .service(delete_pricing_plan)
        .service(list_testimonials)
        .service(get_testimonial)
        .service(create_testimonial)
        .service(update_testimonial)
        .service(delete_testimonial)
        .service(send_customer_details)
        .service(payment_webhook);
    }

    #[get("/health")]
    pub async fn health() -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "status": "healthy",
            "message": "PlantBased Backend is running"
        }))
    }

    // --- Auth ---

    #[post("/api/v1/auth/login")]
    pub async fn login(state: State, req: web::Json<LoginRequest>) -> AppResult<HttpResponse> {
        let req = req.into_inner();
        let response = state.authenticate_admin(&req.email, &req.password).await?;
        Ok(HttpResponse::Ok().json(response))
    }

    #[post("/api/v1/auth/refresh")]
    pub async fn refresh(state: State, req: web::Json<RefreshTokenRequest>) -> AppResult<HttpResponse> {
        let token = state.refresh_token(&req.refresh_token).await?;
        Ok(HttpResponse::Ok().json(RefreshTokenResponse { token }))
    }

    // --- Admin profile ---

    #[get("/api/v1/admin/profile")]
    pub async fn get_profile(state: State, mut admin: LoggedAdmin) -> AppResult<HttpResponse> {
        let admin_id = admin.validate(&state)?;
        Ok(HttpResponse::Ok().json(state.admin_profile(admin_id).await?))
    }

    #[put("/api/v1/admin/profile")]
    pub async fn update_profile(
        state: State,
        mut admin: LoggedAdmin,
        req: web::Json<UpdateProfileRequest>,
    ) -> AppResult<HttpResponse> {
        let admin_id = admin.validate(&state)?;
        let updated = state.update_profile(admin_id, &req).await?;
        Ok(HttpResponse::Ok().json(updated))
    }

    #[put("/api/v1/admin/change-password")]
    pub async fn change_password(
        state: State,
        mut admin: LoggedAdmin,
        req: web::Json<ChangePasswordRequest>,
    ) -> AppResult<HttpResponse> {
        let admin_id = admin.validate(&state)?;
        state
            .change_password(admin_id, &req.current_password, &req.new_password)
            .await?;
        Ok(HttpResponse::Ok().json(SuccessResponse::new("Password changed successfully")))
    }

    // --- Programs ---

    #[get("/api/v1/programs")]
    pub async fn list_programs(state: State) -> AppResult<HttpResponse> {
        Ok(HttpResponse::Ok().json(state.programs.list().await?))
    }

    #[get("/api/v1/programs/{id}")]
    pub async fn get_program(state: State, path: web::Path<i32>) -> AppResult<HttpResponse> {
        Ok(HttpResponse::Ok().json(state.programs.get(path.into_inner()).await?))
    }

    #[post("/api/v1/programs")]
    pub async fn create_program(
        state: State,
        mut admin: LoggedAdmin,
        payload: Multipart,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        let form = ProgramForm::read(payload).await?;
        let content = form.content();
        let plans = form
            .plans()?
            .ok_or_else(|| AppError::Validation("pricingPlans is required".to_string()))?;

        let created = state
            .programs
            .create(content, form.into_images(), plans)
            .await
            .trace_err("creating program")?;
        Ok(HttpResponse::Created().json(created))
    }

    #[put("/api/v1/programs/{id}")]
    pub async fn update_program(
        state: State,
        mut admin: LoggedAdmin,
        path: web::Path<i32>,
        payload: Multipart,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        let form = ProgramForm::read(payload).await?;
        let content = form.content();
        let plans = form.plans()?;

        let updated = state
            .programs
            .update(path.into_inner(), content, form.into_images(), plans)
            .await
            .trace_err("updating program")?;
        Ok(HttpResponse::Ok().json(updated))
    }

    #[delete("/api/v1/programs/{id}")]
    pub async fn delete_program(
        state: State,
        mut admin: LoggedAdmin,
        path: web::Path<i32>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        state.programs.delete(path.into_inner()).await?;
        Ok(HttpResponse::Ok().json(SuccessResponse::new("Program deleted successfully")))
    }

    // --- Pricing plans ---

    #[get("/api/v1/programs/{id}/pricing-plans")]
    pub async fn list_pricing_plans(state: State, path: web::Path<i32>) -> AppResult<HttpResponse> {
        Ok(HttpResponse::Ok().json(state.plans.list(path.into_inner()).await?))
    }

    #[post("/api/v1/programs/{id}/pricing-plans")]
    pub async fn add_pricing_plan(
        state: State,
        mut admin: LoggedAdmin,
        path: web::Path<i32>,
        req: web::Json<PricingPlanSpec>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        let plan = state.plans.add(path.into_inner(), req.into_inner()).await?;
        Ok(HttpResponse::Created().json(plan))
    }

    #[put("/api/v1/programs/{id}/pricing-plans/{plan_id}")]
    pub async fn update_pricing_plan(
        state: State,
        mut admin: LoggedAdmin,
        path: web::Path<(i32, i32)>,
        req: web::Json<PricingPlanSpec>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        let (program_id, plan_id) = path.into_inner();
        let plan = state.plans.update(program_id, plan_id, req.into_inner()).await?;
        Ok(HttpResponse::Ok().json(plan))
    }

    #[delete("/api/v1/programs/{id}/pricing-plans/{plan_id}")]
    pub async fn delete_pricing_plan(
        state: State,
        mut admin: LoggedAdmin,
        path: web::Path<(i32, i32)>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        let (program_id, plan_id) = path.into_inner();
        state.plans.delete(program_id, plan_id).await?;
        Ok(HttpResponse::Ok().json(SuccessResponse::new("Pricing plan deleted successfully")))
    }

    // --- Testimonials ---

    #[get("/api/v1/testimonials")]
    pub async fn list_testimonials(state: State) -> AppResult<HttpResponse> {
        let testimonials = state
            .testimonials
            .list_testimonials()
            .await
            .trace_err("listing testimonials")?;
        Ok(HttpResponse::Ok().json(testimonials))
    }

    #[get("/api/v1/testimonials/{id}")]
    pub async fn get_testimonial(state: State, path: web::Path<i32>) -> AppResult<HttpResponse> {
        let testimonial = state.testimonials.get_testimonial(path.into_inner()).await?;
        Ok(HttpResponse::Ok().json(testimonial))
    }

    #[post("/api/v1/testimonials")]
    pub async fn create_testimonial(
        state: State,
        mut admin: LoggedAdmin,
        req: web::Json<TestimonialRequest>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        req.validate()?;
        let testimonial = state
            .testimonials
            .create_testimonial(&req)
            .await
            .trace_err("creating testimonial")?;
        Ok(HttpResponse::Created().json(testimonial))
    }

    #[put("/api/v1/testimonials/{id}")]
    pub async fn update_testimonial(
        state: State,
        mut admin: LoggedAdmin,
        path: web::Path<i32>,
        req: web::Json<TestimonialRequest>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        req.validate()?;
        let testimonial = state
            .testimonials
            .update_testimonial(path.into_inner(), &req)
            .await?;
        Ok(HttpResponse::Ok().json(testimonial))
    }

    #[delete("/api/v1/testimonials/{id}")]
    pub async fn delete_testimonial(
        state: State,
        mut admin: LoggedAdmin,
        path: web::Path<i32>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state)?;
        state.testimonials.delete_testimonial(path.into_inner()).await?;
        Ok(HttpResponse::Ok().json(SuccessResponse::new("Testimonial deleted successfully")))
    }

    // --- Public forms ---

    #[post("/api/v1/send-customer-details")]
    pub async fn send_customer_details(
        state: State,
        req: web::Json<CustomerDetails>,
    ) -> AppResult<HttpResponse> {
        req.validate()?;
        state.notifier.send_customer_details(&req).await?;
        Ok(HttpResponse::Ok().json(SuccessResponse::new("Customer details sent successfully")))
    }

    #[post("/api/v1/payments/webhook")]
    pub async fn payment_webhook(
        state: State,
        req: HttpRequest,
        body: web::Bytes,
    ) -> AppResult<HttpResponse> {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        let event = state.webhooks.authenticate(signature, &body)?;
        state.webhooks.handle(&event);
        Ok(HttpResponse::Ok().json(WebhookAck {
            status: "success".to_string(),
        }))
    }
}
