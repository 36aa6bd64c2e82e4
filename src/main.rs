use promemoria::{
    app,
    config::{ConfigProvider, EnvVarProvider},
    schedule::run_daily,
    AppState, InjectableServices,
};
use sqlx::postgres::PgPoolOptions;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let env_config_provider = EnvVarProvider::new(env::vars().collect())?;
    let config = env_config_provider.get_config().clone();

    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url.as_str())
        .await?;
    sqlx::migrate!().run(&db).await?;

    let state = AppState::new(InjectableServices {
        db,
        config: config.clone(),
        clock: None,
    })?;

    if let Some(at) = config.daily_run_at {
        log::info!(
            "Daily confirmations enabled at {} {}",
            at.format("%H:%M"),
            config.salon_timezone
        );
        tokio::spawn(run_daily(
            state.runner.clone(),
            state.clock.clone(),
            at,
            config.salon_timezone,
        ));
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;

    Ok(())
}
