use anyhow::Error;
use std::sync::Arc;
use teloxide::dptree;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::commands::{Command, OwnerCommand};
use crate::config::Config;
use crate::database::DatabasePool;
use crate::handlers::ui::StartView;
use crate::handlers::{
    callback_handler, command_handler, join_request_handler, owner_command_handler,
};
use crate::stats::StatsLedger;
use crate::users::UserRegistry;

mod commands;
mod config;
mod database;
mod handlers;
mod stats;
mod users;

const LOG_FILE: &str = "autoreqaccept.log";

fn setup_logging() -> Result<(), Error> {
    use log::LevelFilter;
    use std::env;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::Mutex;

    let console_level_str = env::var("CONSOLE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let console_level = match console_level_str.to_uppercase().as_str() {
        "ERROR" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    let file_level_str = env::var("FILE_LOG_LEVEL").unwrap_or_else(|_| "OFF".to_string());
    let file_level_config = match file_level_str.to_uppercase().as_str() {
        "ERROR" => Some(LevelFilter::Error),
        "ALL" | "INFO" => Some(LevelFilter::Info),
        _ => None,
    };

    // The logger has to pass through the most verbose of the two sinks.
    let max_level = std::cmp::max(console_level, file_level_config.unwrap_or(LevelFilter::Off));

    let log_file = if file_level_config.is_some() {
        let file = OpenOptions::new().create(true).append(true).open(LOG_FILE)?;
        Some(Arc::new(Mutex::new(file)))
    } else {
        None
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .filter(None, max_level)
        .format(move |buf, record| {
            let formatted_record = format!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            );

            if record.level() <= console_level {
                writeln!(buf, "{}", formatted_record)?;
            }

            if let Some(file_level) = file_level_config {
                if record.level() <= file_level {
                    if let Some(file_handle) = &log_file {
                        if let Ok(mut guard) = file_handle.lock() {
                            let _ = writeln!(guard, "{}", formatted_record);
                        }
                    }
                }
            }
            Ok(())
        })
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Read .env first so it can set the log levels.
    let env_file = crate::config::load_environment();
    setup_logging()?;

    log::info!("Starting auto-accept bot...");
    let start_time = std::time::Instant::now();

    match env_file {
        Ok(Some(path)) => log::info!("Loaded environment from {:?}", path),
        Ok(None) => log::info!("No .env file found, using process environment"),
        Err(e) => log::warn!("Failed to read .env file: {}", e),
    }

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    log::info!(
        "Owner: {}, API id: {}, API hash: {} chars",
        config.owner_id.0,
        config.api_id,
        config.api_hash.len()
    );

    let db_pool = Arc::new(DatabasePool::new(
        config.database_path.clone(),
        3, // Maximum 3 simultaneous database connections
    ));

    if let Err(e) = database::init_database(&db_pool).await {
        log::error!("Failed to initialize the database: {}", e);
        return Err(e.into());
    }

    let ledger = StatsLedger::new(db_pool.clone());
    let registry = UserRegistry::new(db_pool.clone());
    let stats = ledger.ensure(chrono::Local::now().date_naive()).await?;
    log::info!(
        "Database {} ready (today: {}, month: {}, total: {})",
        db_pool.path(),
        stats.today,
        stats.month,
        stats.total
    );

    let bot = Bot::new(&config.bot_token);
    let me = bot.get_me().await?;
    log::info!("Authorized as @{}", me.username());

    let start_view = Arc::new(StartView::new(me.username(), &config.updates_channel_url)?);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let handler = dptree::entry()
        .branch(Update::filter_chat_join_request().endpoint(join_request_handler))
        .branch(Update::filter_message().filter_command::<Command>().endpoint(command_handler))
        .branch(
            Update::filter_message()
                .filter_command::<OwnerCommand>()
                .endpoint(owner_command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    log::info!("Bot initialization completed in {:.2?}", start_time.elapsed());
    log::info!("Starting to dispatch updates...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![config, ledger, registry, start_view])
        .error_handler(LoggingErrorHandler::with_custom_text("An error has occurred in the dispatcher"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot shutdown complete");
    Ok(())
}
