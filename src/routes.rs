use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, AuthService, Session};
use crate::error::ApiError;
use crate::lookup::LookupChain;
use crate::models::*;
use crate::quota::{QuotaDecision, QuotaPolicy, SearchesLeft};
use crate::rate_limit::RateLimiterFacade;
use crate::repo::UserRepo;

pub fn config(cfg: &mut web::ServiceConfig) {
    // malformed bodies get the same JSON error shape as everything else
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("Invalid request body: {err}")).into()
    }));
    cfg.service(
        web::scope("/api")
            .service(web::resource("/auth/register").route(web::post().to(register)))
            .service(web::resource("/auth/login").route(web::post().to(login)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(web::resource("/search").route(web::post().to(search)))
            .service(web::resource("/languages").route(web::get().to(list_languages)))
            .service(web::resource("/test").route(web::get().to(self_test))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn UserRepo>,
    pub auth: Arc<AuthService>,
    pub lookup: Arc<LookupChain>,
    pub quota: QuotaPolicy,
    pub rate_limiter: Option<RateLimiterFacade>,
}

const SUCCESS: &str = "success";

#[derive(Debug, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: PublicUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub status: String,
    pub token: String,
    pub data: UserEnvelope,
}

impl From<Session> for AuthResponse {
    fn from(s: Session) -> Self {
        Self { status: SUCCESS.into(), token: s.token, data: UserEnvelope { user: PublicUser::from(&s.user) } }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchData {
    pub word: String,
    pub language: String,
    pub meaning: String,
    pub source: Source,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_word: Option<String>,
    /// Remaining weekly searches, `"unlimited"` for premium, `null` when anonymous.
    #[schema(value_type = Object, nullable)]
    pub searches_left: Option<SearchesLeft>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub status: String,
    pub data: SearchData,
}

impl SearchResponse {
    fn new(found: LookupResult, searches_left: Option<SearchesLeft>) -> Self {
        Self {
            status: SUCCESS.into(),
            data: SearchData {
                word: found.word,
                language: found.language,
                meaning: found.meaning,
                source: found.source,
                note: found.note.unwrap_or_default(),
                original_word: found.original_word,
                searches_left,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LanguagesResponse {
    pub status: String,
    pub data: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeData {
    pub user: PublicUser,
    #[schema(value_type = Object)]
    pub searches_left: SearchesLeft,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub status: String,
    pub data: MeData,
}

/// `Some` only when the field is present and not blank. The value is not trimmed.
fn present(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

fn throttle(
    data: &AppState,
    req: &HttpRequest,
    allow: fn(&RateLimiterFacade, &str) -> bool,
) -> Result<(), ApiError> {
    let Some(rl) = data.rate_limiter.as_ref() else { return Ok(()) };
    let info = req.connection_info();
    let ip = info.realip_remote_addr().unwrap_or("unknown");
    if allow(rl, ip) {
        Ok(())
    } else {
        tracing::info!(ip, path = req.path(), "rate limited");
        Err(ApiError::RateLimited)
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing fields or email already exists"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn register(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    throttle(&data, &req, RateLimiterFacade::allow_register)?;
    let RegisterRequest { name, age, email, password } = payload.into_inner();
    let (Some(name), Some(age), Some(email), Some(password)) =
        (present(name), age, present(email), present(password))
    else {
        return Err(ApiError::Validation("Please provide name, age, email and password".into()));
    };
    let session = data.auth.register(&name, age, &email, &password).await?;
    Ok(HttpResponse::Created().json(AuthResponse::from(session)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Incorrect email or password"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    throttle(&data, &req, RateLimiterFacade::allow_login)?;
    let LoginRequest { email, password } = payload.into_inner();
    let (Some(email), Some(password)) = (present(email), present(password)) else {
        return Err(ApiError::Validation("Please provide email and password".into()));
    };
    let session = data.auth.login(&email, &password).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::from(session)))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current account and quota", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired token")
    )
)]
pub async fn auth_me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user_id = auth.user_id()?;
    let user = data.repo.find_by_id(user_id).await?.ok_or(ApiError::UserNotFound)?;
    let user = data.quota.refresh(&*data.repo, user, Utc::now()).await?;
    let searches_left = data.quota.remaining(&user);
    Ok(HttpResponse::Ok().json(MeResponse {
        status: SUCCESS.into(),
        data: MeData { user: PublicUser::from(&user), searches_left },
    }))
}

#[utoipa::path(
    post,
    path = "/api/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Definition found", body = SearchResponse),
        (status = 400, description = "Word and language are required"),
        (status = 401, description = "Invalid token or unknown user"),
        (status = 403, description = "Weekly free search limit reached"),
        (status = 404, description = "Unsupported language or word not found")
    )
)]
pub async fn search(
    req: HttpRequest,
    bearer: Option<BearerAuth>,
    data: web::Data<AppState>,
    payload: web::Json<SearchRequest>,
) -> Result<HttpResponse, ApiError> {
    throttle(&data, &req, RateLimiterFacade::allow_search)?;
    let SearchRequest { word, language, token } = payload.into_inner();
    let (Some(word), Some(language)) = (present(word), present(language)) else {
        return Err(ApiError::Validation("Word and language are required".into()));
    };

    let found = data.lookup.lookup(&word, &language).await?;

    let token = present(token).or_else(|| bearer.map(|b| b.token().to_owned()));
    let Some(token) = token else {
        // anonymous access: no quota applied
        return Ok(HttpResponse::Ok().json(SearchResponse::new(found, None)));
    };

    let user_id = data.auth.verify_token(&token)?;
    let user = data.repo.find_by_id(user_id).await?.ok_or(ApiError::UserNotFound)?;
    let user = match data.quota.admit(&*data.repo, user, Utc::now()).await? {
        QuotaDecision::Allowed(u) => u,
        QuotaDecision::Denied(_) => return Err(ApiError::QuotaExceeded),
    };
    let searches_left = data.quota.record(&*data.repo, &user).await?;
    Ok(HttpResponse::Ok().json(SearchResponse::new(found, Some(searches_left))))
}

#[utoipa::path(
    get,
    path = "/api/languages",
    responses((status = 200, description = "Supported language names", body = LanguagesResponse))
)]
pub async fn list_languages(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(LanguagesResponse { status: SUCCESS.into(), data: data.lookup.catalog().names() })
}

const FEATURES: &[&str] = &[
    "Wiktionary API Integration",
    "FreeDictionary API Fallback",
    "Local Dictionary Backup",
    "Multi-source Search",
];

/// Liveness check that also exercises the lookup chain. Always 200.
#[utoipa::path(
    get,
    path = "/api/test",
    responses((status = 200, description = "Server and knowledge base status"))
)]
pub async fn self_test(data: web::Data<AppState>) -> HttpResponse {
    let supported = data.lookup.catalog().names();
    let body = match data.lookup.lookup("vanakkam", "tamil").await {
        Ok(result) => serde_json::json!({
            "status": SUCCESS,
            "message": "Server is running with the dictionary knowledge base",
            "knowledgeBaseTest": result,
            "supportedLanguages": supported,
            "features": FEATURES,
        }),
        Err(e) => serde_json::json!({
            "status": SUCCESS,
            "message": "Server running (knowledge base test failed)",
            "error": e.to_string(),
            "supportedLanguages": supported,
        }),
    };
    HttpResponse::Ok().json(body)
}
