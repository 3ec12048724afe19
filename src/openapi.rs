use crate::models::{Language, LoginRequest, LookupResult, PublicUser, RegisterRequest, SearchRequest, Source, Subscription};
use crate::routes::{AuthResponse, LanguagesResponse, MeData, MeResponse, SearchData, SearchResponse, UserEnvelope};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::register,
        crate::routes::login,
        crate::routes::auth_me,
        crate::routes::search,
        crate::routes::list_languages,
        crate::routes::self_test,
    ),
    components(schemas(
        PublicUser, Subscription, RegisterRequest, LoginRequest, SearchRequest,
        Source, LookupResult, Language,
        AuthResponse, UserEnvelope, SearchResponse, SearchData, LanguagesResponse, MeResponse, MeData
    )),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "search", description = "Word lookup with weekly quota"),
    )
)]
pub struct ApiDoc;
