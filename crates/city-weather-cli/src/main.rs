use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use city_weather::{
    app::{ACCENT_PALETTE, App, Dispatcher, Message},
    catalog::{City, CityCatalog},
    config::{CITY_WEATHER_LOG_ENV, DEFAULT_LOG_FILTER, RuntimeConfig},
    date::format_date_line,
    error::{ErrorKind, ValidationError},
    fetch::FetchState,
    filter::filter_cities,
    map,
    providers::{HttpWeatherApi, WeatherApi},
    storage::{CityPreference, FileStore, KeyValueStore, MemoryStore},
    weather_code,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Today's date and current weather for a saved city")]
struct Cli {
    /// Keep the selection in memory for this run instead of saving it.
    #[arg(long, global = true)]
    no_persist: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List catalog cities matching a name or country.
    Cities {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, value_enum)]
        output: Option<OutputModeArg>,
        #[arg(long)]
        json: bool,
    },
    /// Save the selected city.
    Select {
        city_id: String,
        #[arg(long, value_enum)]
        output: Option<OutputModeArg>,
        #[arg(long)]
        json: bool,
    },
    /// Date, selected city and its current weather.
    Show {
        /// Show this city instead of the saved one, without saving it.
        #[arg(long)]
        city: Option<String>,
        /// Step through the accent palette this many times before rendering.
        #[arg(long, default_value_t = 0)]
        cycle_accent: usize,
        #[arg(long, value_enum)]
        output: Option<OutputModeArg>,
        #[arg(long)]
        json: bool,
    },
    /// Today's date.
    Date {
        #[arg(long, value_enum)]
        output: Option<OutputModeArg>,
        #[arg(long)]
        json: bool,
    },
}

const ENVELOPE_SCHEMA_VERSION: &str = "v1";
const ERROR_CODE_USER_INVALID_INPUT: &str = "user.invalid_input";
const ERROR_CODE_USER_UNKNOWN_CITY: &str = "user.unknown_city";
const ERROR_CODE_USER_OUTPUT_MODE_CONFLICT: &str = "user.output_mode_conflict";
const ERROR_CODE_RUNTIME_PROVIDER_INIT: &str = "runtime.provider_init_failed";
const ERROR_CODE_RUNTIME_SERIALIZE: &str = "runtime.serialize_failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputModeArg {
    Human,
    Json,
    AlfredJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliOutputMode {
    Human,
    Json,
    AlfredJson,
}

impl From<OutputModeArg> for CliOutputMode {
    fn from(value: OutputModeArg) -> Self {
        match value {
            OutputModeArg::Human => CliOutputMode::Human,
            OutputModeArg::Json => CliOutputMode::Json,
            OutputModeArg::AlfredJson => CliOutputMode::AlfredJson,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliError {
    kind: ErrorKind,
    code: &'static str,
    message: String,
}

impl CliError {
    fn user(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::User,
            code,
            message: message.into(),
        }
    }

    fn runtime(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Runtime,
            code,
            message: message.into(),
        }
    }

    fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::User => 2,
            ErrorKind::Runtime => 1,
        }
    }
}

impl From<ValidationError> for CliError {
    fn from(error: ValidationError) -> Self {
        let code = match error {
            ValidationError::UnknownCity(_) => ERROR_CODE_USER_UNKNOWN_CITY,
            ValidationError::EmptyCityId => ERROR_CODE_USER_INVALID_INPUT,
        };
        CliError {
            kind: error.kind(),
            code,
            message: error.to_string(),
        }
    }
}

impl Cli {
    fn command_name(&self) -> &'static str {
        match &self.command {
            Commands::Cities { .. } => "city_weather.cities",
            Commands::Select { .. } => "city_weather.select",
            Commands::Show { .. } => "city_weather.show",
            Commands::Date { .. } => "city_weather.date",
        }
    }

    fn output_args(&self) -> (Option<OutputModeArg>, bool) {
        match &self.command {
            Commands::Cities { output, json, .. }
            | Commands::Select { output, json, .. }
            | Commands::Show { output, json, .. }
            | Commands::Date { output, json } => (*output, *json),
        }
    }

    fn output_mode_hint(&self) -> CliOutputMode {
        match self.output_args() {
            (_, true) => CliOutputMode::Json,
            (Some(explicit), false) => explicit.into(),
            (None, false) => CliOutputMode::Human,
        }
    }
}

struct Services<'a> {
    config: &'a RuntimeConfig,
    store: &'a dyn KeyValueStore,
    api: &'a dyn WeatherApi,
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let command = cli.command_name();
    let output_mode = cli.output_mode_hint();
    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            emit_error(command, output_mode, &error);
            std::process::exit(error.exit_code());
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(CITY_WEATHER_LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<String, CliError> {
    let config = RuntimeConfig::from_env();
    let store: Box<dyn KeyValueStore> = if cli.no_persist {
        debug!("persistence disabled, using in-memory store");
        Box::new(MemoryStore::default())
    } else {
        Box::new(FileStore::in_data_dir(&config.data_dir))
    };
    let api = HttpWeatherApi::new(config.forecast_endpoint.clone())
        .map_err(|error| CliError::runtime(ERROR_CODE_RUNTIME_PROVIDER_INIT, error.to_string()))?;

    let services = Services {
        config: &config,
        store: store.as_ref(),
        api: &api,
    };
    run_with(cli, &services, || Local::now().date_naive())
}

fn run_with<N>(cli: Cli, services: &Services<'_>, today_fn: N) -> Result<String, CliError>
where
    N: Fn() -> NaiveDate,
{
    let command = cli.command_name();
    let (output, json_flag) = cli.output_args();
    let output_mode = resolve_output_mode(output, json_flag, CliOutputMode::Human)?;
    let catalog = CityCatalog::builtin(&services.config.default_city_id);
    let preference = CityPreference::new(services.store);

    let result = match cli.command {
        Commands::Cities { query, .. } => {
            let selected = catalog.resolve_selected_city(&preference);
            render_cities(&catalog, selected, &query, output_mode)
        }
        Commands::Select { city_id, .. } => {
            let city = lookup_city(&catalog, &city_id)?;
            let saved = preference.save(city.id);
            render_selection(city, saved, output_mode)
        }
        Commands::Show {
            city, cycle_accent, ..
        } => {
            let mut app = match city.as_deref() {
                Some(id) => App::new(catalog, lookup_city(&catalog, id)?),
                None => App::start(catalog, &preference),
            };
            let dispatcher = Dispatcher::new(services.api, preference);
            for _ in 0..cycle_accent % ACCENT_PALETTE.len() {
                dispatcher.dispatch(&mut app, Message::CycleAccent);
            }
            dispatcher.dispatch(&mut app, Message::Mount);
            render_show(&app, today_fn(), output_mode)
        }
        Commands::Date { .. } => render_date(today_fn(), output_mode),
    };

    match output_mode {
        CliOutputMode::Json => render_json_envelope(command, result),
        CliOutputMode::Human | CliOutputMode::AlfredJson => Ok(match result {
            Rendered::Text(text) => text,
            Rendered::Value(value) => serialize(&value, "output")?,
        }),
    }
}

enum Rendered {
    Text(String),
    Value(Value),
}

fn lookup_city(catalog: &CityCatalog, raw: &str) -> Result<&'static City, CliError> {
    let id = raw.trim().to_ascii_lowercase();
    if id.is_empty() {
        return Err(ValidationError::EmptyCityId.into());
    }
    catalog
        .find_by_id(&id)
        .ok_or_else(|| ValidationError::UnknownCity(raw.trim().to_string()).into())
}

fn resolve_output_mode(
    output: Option<OutputModeArg>,
    json_flag: bool,
    default_mode: CliOutputMode,
) -> Result<CliOutputMode, CliError> {
    match (output.map(Into::into), json_flag) {
        (Some(mode), true) if mode != CliOutputMode::Json => Err(CliError::user(
            ERROR_CODE_USER_OUTPUT_MODE_CONFLICT,
            format!(
                "--json conflicts with --output {}",
                output_mode_label(mode)
            ),
        )),
        (_, true) => Ok(CliOutputMode::Json),
        (Some(mode), false) => Ok(mode),
        (None, false) => Ok(default_mode),
    }
}

fn render_cities(
    catalog: &CityCatalog,
    selected: &City,
    query: &str,
    output_mode: CliOutputMode,
) -> Rendered {
    let matches = filter_cities(catalog.cities(), query);

    match output_mode {
        CliOutputMode::Json => Rendered::Value(json!({
            "query": query,
            "selected_city_id": selected.id,
            "cities": matches
                .iter()
                .map(|city| {
                    json!({
                        "id": city.id,
                        "name": city.name,
                        "country": city.country,
                        "latitude": city.latitude,
                        "longitude": city.longitude,
                        "selected": city.id == selected.id,
                    })
                })
                .collect::<Vec<_>>(),
        })),
        CliOutputMode::AlfredJson => {
            let mut items: Vec<Value> = matches
                .iter()
                .map(|city| {
                    let marker = if city.id == selected.id { " ✓" } else { "" };
                    json!({
                        "uid": city.id,
                        "title": format!("{}{marker}", city.label()),
                        "subtitle": format!("lat={:.4} lon={:.4}", city.latitude, city.longitude),
                        "arg": city.id,
                        "autocomplete": city.name,
                        "valid": true,
                    })
                })
                .collect();
            if items.is_empty() {
                items.push(json!({
                    "title": "No matching cities",
                    "subtitle": format!("Nothing matches \"{query}\""),
                    "valid": false,
                }));
            }
            Rendered::Value(json!({ "items": items }))
        }
        CliOutputMode::Human => {
            if matches.is_empty() {
                return Rendered::Text(format!("no cities match \"{query}\""));
            }
            let lines: Vec<String> = matches
                .iter()
                .map(|city| {
                    let marker = if city.id == selected.id { '*' } else { ' ' };
                    format!("{marker} {:<14} {}", city.id, city.label())
                })
                .collect();
            Rendered::Text(lines.join("\n"))
        }
    }
}

fn render_selection(city: &City, saved: bool, output_mode: CliOutputMode) -> Rendered {
    match output_mode {
        CliOutputMode::Json => Rendered::Value(json!({
            "city_id": city.id,
            "label": city.label(),
            "saved": saved,
        })),
        CliOutputMode::AlfredJson => Rendered::Value(json!({
            "items": [{
                "title": format!("Selected {}", city.label()),
                "subtitle": if saved { "Saved as default city" } else { "Selection could not be saved" },
                "arg": city.id,
                "valid": false,
            }]
        })),
        CliOutputMode::Human if saved => Rendered::Text(format!("selected {}", city.label())),
        CliOutputMode::Human => Rendered::Text(format!(
            "selected {} (not saved, see log for the storage error)",
            city.label()
        )),
    }
}

fn render_show(app: &App, today: NaiveDate, output_mode: CliOutputMode) -> Rendered {
    let city = app.selected_city();
    let date_line = format_date_line(today);
    let map_url = map::embed_url(city);

    match output_mode {
        CliOutputMode::Json => {
            let conditions = app.weather().snapshot().map(|snapshot| {
                let category = weather_code::classify(snapshot.weather_code);
                json!({
                    "category": category,
                    "description": weather_code::describe(snapshot.weather_code),
                    "icon": category.icon(),
                })
            });
            Rendered::Value(json!({
                "date": date_line,
                "city": city,
                "weather": app.weather(),
                "conditions": conditions,
                "map_url": map_url,
                "accent": app.accent(),
            }))
        }
        CliOutputMode::AlfredJson => {
            let mut weather_item = json!({
                "title": format!("{} {}", city.label(), weather_headline(app.weather())),
                "subtitle": date_line,
                "arg": city.id,
                "valid": false,
            });
            if let Some(snapshot) = app.weather().snapshot() {
                let icon = weather_code::classify(snapshot.weather_code).icon();
                weather_item["icon"] = json!({ "path": format!("assets/icons/{icon}.png") });
            }
            Rendered::Value(json!({
                "items": [
                    weather_item,
                    {
                        "title": format!("Open map of {}", city.name),
                        "subtitle": map_url,
                        "arg": map_url,
                        "valid": true,
                    }
                ]
            }))
        }
        CliOutputMode::Human => Rendered::Text(
            [
                date_line,
                city.label(),
                weather_headline(app.weather()),
                format!("map: {map_url}"),
                format!("accent: {}", app.accent()),
            ]
            .join("\n"),
        ),
    }
}

fn weather_headline(state: &FetchState) -> String {
    match state {
        FetchState::Idle | FetchState::Loading { .. } => "loading…".to_string(),
        FetchState::Success(snapshot) => format!(
            "{:.1}°C {}",
            snapshot.temperature_celsius,
            weather_code::describe(snapshot.weather_code)
        ),
        FetchState::Failure { reason, .. } => reason.clone(),
    }
}

fn render_date(today: NaiveDate, output_mode: CliOutputMode) -> Rendered {
    let line = format_date_line(today);
    match output_mode {
        CliOutputMode::Json => Rendered::Value(json!({
            "date": line,
            "iso": today.to_string(),
        })),
        CliOutputMode::AlfredJson => Rendered::Value(json!({
            "items": [{ "title": line, "arg": today.to_string(), "valid": true }]
        })),
        CliOutputMode::Human => Rendered::Text(line),
    }
}

fn render_json_envelope(command: &str, rendered: Rendered) -> Result<String, CliError> {
    let result = match rendered {
        Rendered::Value(value) => value,
        Rendered::Text(text) => Value::String(text),
    };
    serialize(
        &json!({
            "schema_version": ENVELOPE_SCHEMA_VERSION,
            "command": command,
            "ok": true,
            "result": result,
        }),
        "output envelope",
    )
}

fn serialize(value: &Value, what: &str) -> Result<String, CliError> {
    serde_json::to_string(value).map_err(|error| {
        CliError::runtime(
            ERROR_CODE_RUNTIME_SERIALIZE,
            format!("failed to serialize {what}: {error}"),
        )
    })
}

fn emit_error(command: &str, output_mode: CliOutputMode, error: &CliError) {
    match output_mode {
        CliOutputMode::Json => {
            let payload = json!({
                "schema_version": ENVELOPE_SCHEMA_VERSION,
                "command": command,
                "ok": false,
                "error": {
                    "code": error.code,
                    "message": error.message,
                    "details": {
                        "kind": error_kind_label(error.kind),
                        "exit_code": error.exit_code(),
                    }
                }
            });
            println!("{payload}");
        }
        CliOutputMode::AlfredJson => {
            let payload = json!({
                "items": [{
                    "title": format!("Error [{}]", error.code),
                    "subtitle": error.message,
                    "valid": false
                }]
            });
            println!("{payload}");
        }
        CliOutputMode::Human => {
            eprintln!("error[{}]: {}", error.code, error.message);
        }
    }
}

fn error_kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::User => "user",
        ErrorKind::Runtime => "runtime",
    }
}

fn output_mode_label(mode: CliOutputMode) -> &'static str {
    match mode {
        CliOutputMode::Human => "human",
        CliOutputMode::Json => "json",
        CliOutputMode::AlfredJson => "alfred-json",
    }
}
