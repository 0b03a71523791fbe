use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::Extension;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use survey_pulse::config::AppConfig;
use survey_pulse::error::AppError;
use survey_pulse::surveys::{
    compute_statistics, is_due, next_due_instant, survey_router, DeliveryDispatcher,
    DispatchError, ResponseCsvImporter, StatisticsReport, StoreError, Survey, SurveyId,
    SurveyResponse, SurveyService, SurveyStatus, SurveyStore,
};
use survey_pulse::telemetry;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: Arc<PrometheusHandle>,
}

#[derive(Parser, Debug)]
#[command(
    name = "Survey Pulse",
    about = "Run the survey statistics and delivery service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Offline survey tooling
    Survey {
        #[command(subcommand)]
        command: SurveyCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SurveyCommand {
    /// Compute statistics for a survey from a CSV response export
    Stats(StatsArgs),
    /// Preview the delivery schedule for a survey's config
    Schedule(ScheduleArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// JSON file with an array of survey definitions to seed the store
    #[arg(long)]
    surveys: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Survey definition (JSON)
    #[arg(long)]
    survey: PathBuf,
    /// Response export (CSV)
    #[arg(long)]
    responses: PathBuf,
}

#[derive(Args, Debug)]
struct ScheduleArgs {
    /// Survey definition (JSON)
    #[arg(long)]
    survey: PathBuf,
    /// Reference instant (YYYY-MM-DDTHH:MM:SS, defaults to now)
    #[arg(long, value_parser = parse_instant)]
    now: Option<NaiveDateTime>,
    /// Instant of the last delivery, if one happened
    #[arg(long, value_parser = parse_instant)]
    last_sent: Option<NaiveDateTime>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Survey {
            command: SurveyCommand::Stats(args),
        } => run_stats(args),
        Command::Survey {
            command: SurveyCommand::Schedule(args),
        } => run_schedule(args),
    }
}

fn parse_instant(raw: &str) -> Result<NaiveDateTime, String> {
    let trimmed = raw.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(instant) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(instant);
        }
    }
    Err(format!("failed to parse '{raw}' as YYYY-MM-DDTHH:MM:SS"))
}

fn load_survey(path: &PathBuf) -> Result<Survey, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let store = Arc::new(InMemorySurveyStore::default());
    if let Some(path) = args.surveys.take() {
        let raw = std::fs::read_to_string(path)?;
        let surveys: Vec<Survey> = serde_json::from_str(&raw)?;
        for survey in surveys {
            store.insert_survey(survey);
        }
    }

    let dispatcher = Arc::new(LoggingDispatcher {
        from_address: config.delivery.from_address.clone(),
    });
    let service = Arc::new(SurveyService::new(store, dispatcher));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = survey_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "survey pulse service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<(), AppError> {
    let survey = load_survey(&args.survey)?;
    let responses = ResponseCsvImporter::from_path(&args.responses, &survey)?;
    let report = compute_statistics(&survey, &responses);
    render_statistics(&survey, &report);
    Ok(())
}

fn run_schedule(args: ScheduleArgs) -> Result<(), AppError> {
    let survey = load_survey(&args.survey)?;
    let now = args.now.unwrap_or_else(|| Local::now().naive_local());

    println!("Delivery preview for '{}'", survey.title);
    println!("Reference instant: {now}");

    let Some(config) = &survey.delivery_config else {
        println!("No delivery configuration; sends are external.");
        return Ok(());
    };
    config
        .validate()
        .map_err(survey_pulse::surveys::SurveyServiceError::from)?;

    match next_due_instant(config, now, args.last_sent) {
        Some(due) => {
            println!("Next due instant: {due}");
            if is_due(config, now, args.last_sent) {
                println!("A delivery is due now.");
            }
        }
        None => println!("No recurring schedule (manual or event-triggered config)."),
    }
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn render_statistics(survey: &Survey, report: &StatisticsReport) {
    let stats = &report.statistics;

    println!("Statistics for '{}'", survey.title);
    println!("Responses: {}", stats.total_responses);
    println!("Completion rate: {:.1}%", stats.completion_rate);
    println!(
        "Average completion time: {:.0}s",
        stats.average_completion_time
    );

    for question in &stats.question_stats {
        println!("\n{} ({})", question.question_title, question.question_id);
        if question.responses.is_empty() {
            println!("- no answers yet");
            continue;
        }
        for bucket in &question.responses {
            println!(
                "- {}: {} ({:.1}%)",
                bucket.answer, bucket.count, bucket.percentage
            );
        }
    }

    if !report.diagnostics.is_empty() {
        println!("\nData-quality issues");
        for issue in &report.diagnostics {
            println!("- {issue}");
        }
    }
}

static RESPONSE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_response_id() -> String {
    let id = RESPONSE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("rsp-{id:06}")
}

/// Store double backing the demo server; production deployments plug a real
/// database behind the same trait.
#[derive(Default, Clone)]
struct InMemorySurveyStore {
    surveys: Arc<Mutex<HashMap<String, Survey>>>,
    responses: Arc<Mutex<HashMap<String, Vec<SurveyResponse>>>>,
    last_sent: Arc<Mutex<HashMap<String, NaiveDateTime>>>,
    pending: Arc<Mutex<HashMap<String, NaiveDateTime>>>,
}

impl InMemorySurveyStore {
    fn insert_survey(&self, survey: Survey) {
        let mut guard = self.surveys.lock().expect("store mutex poisoned");
        guard.insert(survey.id.0.clone(), survey);
    }
}

impl SurveyStore for InMemorySurveyStore {
    fn get_survey(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
        let guard = self.surveys.lock().expect("store mutex poisoned");
        Ok(guard.get(&id.0).cloned())
    }

    fn list_surveys(&self, status: Option<SurveyStatus>) -> Result<Vec<Survey>, StoreError> {
        let guard = self.surveys.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter(|survey| status.is_none() || survey.status == status)
            .cloned()
            .collect())
    }

    fn list_responses(&self, id: &SurveyId) -> Result<Vec<SurveyResponse>, StoreError> {
        let guard = self.responses.lock().expect("store mutex poisoned");
        Ok(guard.get(&id.0).cloned().unwrap_or_default())
    }

    fn insert_response(&self, mut response: SurveyResponse) -> Result<SurveyResponse, StoreError> {
        if response.id.is_none() {
            response.id = Some(next_response_id());
        }
        let mut guard = self.responses.lock().expect("store mutex poisoned");
        guard
            .entry(response.survey_id.0.clone())
            .or_default()
            .push(response.clone());
        Ok(response)
    }

    fn last_sent(&self, id: &SurveyId) -> Result<Option<NaiveDateTime>, StoreError> {
        let guard = self.last_sent.lock().expect("store mutex poisoned");
        Ok(guard.get(&id.0).copied())
    }

    fn record_sent(&self, id: &SurveyId, sent_at: NaiveDateTime) -> Result<(), StoreError> {
        let mut guard = self.last_sent.lock().expect("store mutex poisoned");
        guard.insert(id.0.clone(), sent_at);
        Ok(())
    }

    fn pending_send(&self, id: &SurveyId) -> Result<Option<NaiveDateTime>, StoreError> {
        let guard = self.pending.lock().expect("store mutex poisoned");
        Ok(guard.get(&id.0).copied())
    }

    fn set_pending_send(
        &self,
        id: &SurveyId,
        send_at: Option<NaiveDateTime>,
    ) -> Result<(), StoreError> {
        let mut guard = self.pending.lock().expect("store mutex poisoned");
        match send_at {
            Some(send_at) => {
                guard.insert(id.0.clone(), send_at);
            }
            None => {
                guard.remove(&id.0);
            }
        }
        Ok(())
    }
}

/// Dispatcher that logs instead of talking to a mail provider.
struct LoggingDispatcher {
    from_address: String,
}

impl DeliveryDispatcher for LoggingDispatcher {
    fn send(&self, survey: &Survey, recipients: &[String]) -> Result<(), DispatchError> {
        info!(
            survey = %survey.id.0,
            from = %self.from_address,
            recipients = recipients.len(),
            "survey delivery dispatched"
        );
        Ok(())
    }
}
