//! # API REST
//!
//! HTTP surface for the cardio risk predictor.
//!
//! Handles:
//! - The browser form (`GET /`, `POST /predict`) rendered server-side
//! - The JSON API (`/api/predict`, `/api/model`, `/api/schema`) and `/health`
//! - OpenAPI/Swagger documentation and CORS
//!
//! Uses `cardio-core` for loading and inference and `api-shared` for response bodies.

#![warn(rust_2018_idioms)]

pub mod html;

use api_shared::{ErrorRes, HealthRes, HealthService, ModelInfoRes, PredictRes};
use axum::{
    body::{Body, Bytes},
    extract::{rejection::FormRejection, FromRequest, RawForm, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use cardio_core::schema::{ChoiceOption, FieldSchema, Widget};
use cardio_core::{
    ArtifactLoader, ChestPainType, ClinicalObservation, CoreConfig, Feature, FeatureImportance,
    FormSchema, InferenceAdapter, InferenceError, LoadError, PredictionResult, RestingEcg,
    RiskLevel, Sex, StSlope, Thalassemia, FEATURE_NAMES,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
///
/// The loader owns the memoized classifier; handlers only ever read its cached outcome.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    loader: Arc<ArtifactLoader>,
    schema: Arc<FormSchema>,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, loader: Arc<ArtifactLoader>) -> Self {
        let schema = Arc::new(FormSchema::new(cfg.encoding()));
        Self {
            cfg,
            loader,
            schema,
        }
    }

    pub fn loader(&self) -> &ArtifactLoader {
        &self.loader
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, api_predict, model_info, form_schema),
    components(schemas(
        HealthRes,
        PredictRes,
        ModelInfoRes,
        ErrorRes,
        ClinicalObservation,
        Sex,
        ChestPainType,
        RestingEcg,
        StSlope,
        Thalassemia,
        Feature,
        FeatureImportance,
        RiskLevel,
        FormSchema,
        FieldSchema,
        Widget,
        ChoiceOption,
    ))
)]
struct ApiDoc;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_form))
        .route("/health", get(health))
        .route("/api/predict", post(api_predict))
        .route("/api/model", get(model_info))
        .route("/api/schema", get(form_schema))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Why a prediction request produced no result.
#[derive(Debug)]
enum PredictFailure {
    /// The model could not be loaded; nothing can be served until restart.
    Unavailable(LoadError),
    /// This request failed; the next one may succeed.
    Inference(InferenceError),
}

/// Run one observation through the loaded classifier.
async fn run_prediction(
    state: &AppState,
    observation: &ClinicalObservation,
) -> Result<(PredictionResult, Option<Vec<FeatureImportance>>), PredictFailure> {
    let handle = state
        .loader
        .load()
        .await
        .map_err(PredictFailure::Unavailable)?;
    let adapter = InferenceAdapter::new(handle);

    let result = adapter.predict(observation).map_err(|e| {
        tracing::error!("inference failed: {e}");
        PredictFailure::Inference(e)
    })?;

    if !result.threshold_agrees() {
        tracing::warn!(
            predicted_class = result.predicted_class,
            probability = result.probability,
            "classifier label disagrees with its probability; reporting the label"
        );
    }
    tracing::debug!(risk = ?result.risk_label, probability = result.probability, "prediction");

    Ok((result, adapter.top_features(state.cfg.top_features())))
}

fn fatal_response(e: &LoadError) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Html(html::fatal_page(&e.to_string())),
    )
        .into_response()
}

/// Browser form with default values, or the fatal error page if the model is unavailable.
async fn index(State(state): State<AppState>) -> Response {
    match state.loader.load().await {
        Ok(_) => Html(html::form_page(
            &state.schema,
            &html::FormValues::from_observation(&FormSchema::default_observation()),
            None,
        ))
        .into_response(),
        Err(e) => fatal_response(&e),
    }
}

/// Decode a urlencoded body with axum's form extractor.
async fn decode_form<T>(body: Bytes) -> Result<T, FormRejection>
where
    Form<T>: FromRequest<(), Rejection = FormRejection>,
{
    let mut request = Request::new(Body::from(body));
    *request.method_mut() = Method::POST;
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    Form::<T>::from_request(request, &()).await.map(|Form(value)| value)
}

/// Form submission: re-render the form with the submitted values and the results panel.
async fn predict_form(State(state): State<AppState>, RawForm(body): RawForm) -> Response {
    let observation = match decode_form::<ClinicalObservation>(body.clone()).await {
        Ok(observation) => observation,
        Err(rejection) => {
            if let Some(Err(e)) = state.loader.cached() {
                return fatal_response(&e);
            }
            // Keep whatever the user typed so the form can be corrected in place.
            let submitted = decode_form::<Vec<(String, String)>>(body)
                .await
                .unwrap_or_default();
            let message = rejection.body_text();
            let outcome = html::Outcome::Error(&message);
            let page = html::form_page(
                &state.schema,
                &html::FormValues::from_submitted(submitted),
                Some(&outcome),
            );
            return (StatusCode::BAD_REQUEST, Html(page)).into_response();
        }
    };
    let values = html::FormValues::from_observation(&observation);

    match run_prediction(&state, &observation).await {
        Ok((result, top_features)) => {
            let outcome = html::Outcome::Prediction {
                result: &result,
                top_features: top_features.as_deref(),
            };
            Html(html::form_page(&state.schema, &values, Some(&outcome))).into_response()
        }
        Err(PredictFailure::Inference(e)) => {
            let message = e.to_string();
            let outcome = html::Outcome::Error(&message);
            let page = html::form_page(&state.schema, &values, Some(&outcome));
            (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response()
        }
        Err(PredictFailure::Unavailable(e)) => fatal_response(&e),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint
///
/// Reports liveness and whether the model artifact was loaded. Does not trigger a load.
async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health(state.loader.cached().as_ref()))
}

#[utoipa::path(
    post,
    path = "/api/predict",
    request_body = ClinicalObservation,
    responses(
        (status = 200, description = "Risk prediction", body = PredictRes),
        (status = 422, description = "Inference failed for this observation", body = ErrorRes),
        (status = 503, description = "Model artifact could not be loaded", body = ErrorRes)
    )
)]
/// Predict heart disease risk for one observation
///
/// # Errors
/// Returns `422 Unprocessable Entity` if the classifier rejects the observation and
/// `503 Service Unavailable` if the model artifact failed to load.
async fn api_predict(
    State(state): State<AppState>,
    Json(observation): Json<ClinicalObservation>,
) -> Result<Json<PredictRes>, (StatusCode, Json<ErrorRes>)> {
    match run_prediction(&state, &observation).await {
        Ok((result, top_features)) => Ok(Json(PredictRes::new(&result, top_features))),
        Err(PredictFailure::Inference(e)) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorRes::inference_failed(e.to_string())),
        )),
        Err(PredictFailure::Unavailable(e)) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorRes::model_unavailable(e.to_string())),
        )),
    }
}

#[utoipa::path(
    get,
    path = "/api/model",
    responses(
        (status = 200, description = "Loaded model description", body = ModelInfoRes),
        (status = 503, description = "Model artifact could not be loaded", body = ErrorRes)
    )
)]
/// Describe the loaded model
///
/// Returns the model kind, the feature order it consumes and, when available, its
/// highest-weighted attributes.
async fn model_info(
    State(state): State<AppState>,
) -> Result<Json<ModelInfoRes>, (StatusCode, Json<ErrorRes>)> {
    let handle = state.loader.load().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorRes::model_unavailable(e.to_string())),
        )
    })?;
    let adapter = InferenceAdapter::new(handle);

    Ok(Json(ModelInfoRes {
        kind: adapter.classifier().kind().to_string(),
        source: state.cfg.artifact_source().to_string(),
        feature_order: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        major_vessels_max: state.cfg.encoding().major_vessels_max(),
        top_features: adapter.top_features(state.cfg.top_features()),
    }))
}

#[utoipa::path(
    get,
    path = "/api/schema",
    responses(
        (status = 200, description = "Input form description", body = FormSchema)
    )
)]
/// Describe the input form
async fn form_schema(State(state): State<AppState>) -> Json<FormSchema> {
    Json(state.schema.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use cardio_core::{ArtifactSource, EncodingProfile};
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn checked_in_artifact() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../models/final_heart_disease_model.json")
    }

    fn state_for(path: PathBuf) -> AppState {
        let cfg = Arc::new(
            CoreConfig::new(
                ArtifactSource::Local(path),
                EncodingProfile::new(4).unwrap(),
                5,
            )
            .unwrap(),
        );
        let loader = Arc::new(ArtifactLoader::from_config(&cfg));
        AppState::new(cfg, loader)
    }

    fn app() -> Router {
        router(state_for(checked_in_artifact()))
    }

    fn broken_app() -> Router {
        router(state_for(PathBuf::from("/nonexistent/final_heart_disease_model.json")))
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    const GOLDEN_FORM: &str = "age=63&sex=male&chest_pain_type=typical_angina&resting_bp=145\
        &cholesterol=233&fasting_blood_sugar_high=true&resting_ecg=normal&max_heart_rate=150\
        &exercise_angina=false&st_depression=2.3&st_slope=downsloping&major_vessels=0\
        &thalassemia=fixed_defect";

    fn golden_json() -> serde_json::Value {
        serde_json::json!({
            "age": 63,
            "sex": "male",
            "chest_pain_type": "typical_angina",
            "resting_bp": 145,
            "cholesterol": 233,
            "fasting_blood_sugar_high": true,
            "resting_ecg": "normal",
            "max_heart_rate": 150,
            "exercise_angina": false,
            "st_depression": 2.3,
            "st_slope": "downsloping",
            "major_vessels": 0,
            "thalassemia": "fixed_defect"
        })
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::post("/predict")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_request(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("Enter Patient Information"));
        assert!(html.contains("name=\"thalassemia\""));
    }

    #[tokio::test]
    async fn test_form_submission_renders_result() {
        let response = app().oneshot(form_request(GOLDEN_FORM)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("High Risk – Probability: 66.7%"));
        assert!(html.contains("Top contributing attributes"));
        // Submitted values are kept in the form.
        assert!(html.contains("<option value=\"fixed_defect\" selected>"));
    }

    #[tokio::test]
    async fn test_malformed_form_keeps_submitted_values() {
        let response = app()
            .oneshot(form_request("age=63&sex=robot&cholesterol=lots&thalassemia=fixed_defect"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_string(response).await;
        assert!(html.contains("Prediction failed"));
        assert!(html.contains("<form"));
        assert!(html.contains("name=\"age\" min=\"20\" max=\"100\" step=\"1\" value=\"63\""));
        assert!(html.contains("value=\"lots\""));
        assert!(html.contains("<option value=\"fixed_defect\" selected>"));
    }

    #[tokio::test]
    async fn test_api_predict_returns_pinned_result() {
        let response = app()
            .oneshot(json_request("/api/predict", &golden_json()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let res: PredictRes = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(res.risk_label, RiskLevel::High);
        assert_eq!(res.probability_percent, "66.7%");
        assert_eq!(res.top_features.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_fatal_load_halts_every_surface() {
        let app = broken_app();

        let index = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(index.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_string(index).await.contains("Error loading model"));

        let form = app.clone().oneshot(form_request(GOLDEN_FORM)).await.unwrap();
        assert_eq!(form.status(), StatusCode::SERVICE_UNAVAILABLE);

        let api = app
            .clone()
            .oneshot(json_request("/api/predict", &golden_json()))
            .await
            .unwrap();
        assert_eq!(api.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err: ErrorRes = serde_json::from_str(&body_string(api).await).unwrap();
        assert_eq!(err.error, "model_unavailable");

        let health = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let health: HealthRes = serde_json::from_str(&body_string(health).await).unwrap();
        assert!(!health.ok);
    }

    #[tokio::test]
    async fn test_fatal_load_is_attempted_once_across_requests() {
        let state = state_for(PathBuf::from("/nonexistent/model.json"));
        let app = router(state.clone());

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(Request::get("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }

        assert_eq!(state.loader().load_attempts(), 1);
    }

    #[tokio::test]
    async fn test_model_info_and_schema() {
        let app = app();

        let info = app
            .clone()
            .oneshot(Request::get("/api/model").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(info.status(), StatusCode::OK);
        let info: ModelInfoRes = serde_json::from_str(&body_string(info).await).unwrap();
        assert_eq!(info.kind, "random_forest");
        assert_eq!(info.feature_order[11], "ca");
        assert_eq!(info.top_features.unwrap()[0].column, "cp");

        let schema = app
            .oneshot(Request::get("/api/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let schema: serde_json::Value = serde_json::from_str(&body_string(schema).await).unwrap();
        assert_eq!(schema["fields"].as_array().unwrap().len(), 13);
        assert_eq!(schema["fields"][11]["widget"]["max"], 4.0);
    }
}
