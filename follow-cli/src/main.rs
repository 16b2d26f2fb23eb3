use std::{sync::Arc, time::Duration};

use clap::Parser;
use error::AppError;
use hls_follower::{
    DownloaderConfig, FollowerConfig, InitialSegmentPolicy, PlaylistFollower, ProxyAuth,
    ProxyConfig, ProxyType, RestartPolicy, Supervisor, VariantSelectionPolicy,
};
use indicatif::MultiProgress;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod error;
mod utils;

use cli::CliArgs;
use utils::progress::ProgressManager;
use utils::{format_bytes, format_duration, parse_duration, parse_headers};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    // Keeps the file writer flushing until bootstrap returns
    let _log_guard = init_logging(&args)?;

    let result = run(&args).await;
    if let Err(e) = &result {
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
    }
    result
}

async fn run(args: &CliArgs) -> Result<(), AppError> {
    info!("hls-follow {}", env!("CARGO_PKG_VERSION"));
    info!("==================================================================");

    info!(
        "HTTP timeout configuration: overall={}s, connect={}s, read={}s, playlist={}s, segment={}s",
        args.timeout,
        args.connect_timeout,
        args.read_timeout,
        args.playlist_timeout,
        args.segment_timeout
    );

    let download_config = build_download_config(args)?;
    let follower_config = build_follower_config(args, download_config)?;

    let progress_manager = if args.show_progress {
        ProgressManager::new(MultiProgress::new())
    } else {
        ProgressManager::new_disabled()
    };
    let progress = progress_manager.clone();
    let follower = PlaylistFollower::new(follower_config)?
        .with_event_handler(Arc::new(move |event| progress.handle_event(event)));

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let result = if args.preload {
        run_preload(&follower, &args.url, &cancel).await
    } else {
        let supervisor = Supervisor::new(Arc::new(follower));
        supervisor
            .run(&args.url, &cancel)
            .await
            .map(|end| info!(?end, "Follower finished"))
            .map_err(AppError::from)
    };

    progress_manager.finish();
    result
}

fn init_logging(args: &CliArgs) -> Result<WorkerGuard, AppError> {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&args.log_file)?;
    let (file_writer, guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    Ok(guard)
}

fn build_download_config(args: &CliArgs) -> Result<DownloaderConfig, AppError> {
    let mut builder = DownloaderConfig::builder()
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_read_timeout(Duration::from_secs(args.read_timeout))
        .with_headers(parse_headers(&args.headers)?);

    if let Some(user_agent) = &args.user_agent {
        builder = builder.with_user_agent(user_agent);
    }

    if args.no_proxy {
        // No proxy flag overrides everything else
        info!("All proxy settings disabled (--no-proxy flag)");
        builder = builder.with_system_proxy(false);
    } else if let Some(proxy_url) = &args.proxy {
        let proxy_type: ProxyType = args
            .proxy_type
            .parse()
            .map_err(|e: hls_follower::FollowerError| AppError::InvalidInput(e.to_string()))?;

        let auth = match (&args.proxy_user, &args.proxy_pass) {
            (Some(username), Some(password)) => Some(ProxyAuth {
                username: username.clone(),
                password: password.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::InvalidInput(
                    "--proxy-user and --proxy-pass must be given together".to_string(),
                ));
            }
        };

        info!(
            proxy_url = %proxy_url,
            proxy_type = ?proxy_type,
            has_auth = auth.is_some(),
            "Using explicit proxy configuration"
        );
        builder = builder.with_proxy(ProxyConfig {
            url: proxy_url.clone(),
            proxy_type,
            auth,
        });
    } else {
        if args.use_system_proxy {
            info!("Using system proxy settings");
        }
        builder = builder.with_system_proxy(args.use_system_proxy);
    }

    Ok(builder.build())
}

fn build_follower_config(
    args: &CliArgs,
    download_config: DownloaderConfig,
) -> Result<FollowerConfig, AppError> {
    let variant_policy: VariantSelectionPolicy = args
        .variant
        .parse()
        .map_err(|e: hls_follower::FollowerError| AppError::InvalidInput(e.to_string()))?;

    let initial_policy = if args.download_existing {
        InitialSegmentPolicy::DownloadExisting
    } else {
        InitialSegmentPolicy::SkipExisting
    };

    let poll_interval = args.poll_interval.as_deref().map(parse_duration).transpose()?;
    let restart_delay = parse_duration(&args.restart_delay)?;
    let restart_policy = match args.max_restart_delay.as_deref() {
        Some(max) => {
            let max = parse_duration(max)?;
            if max < restart_delay {
                return Err(AppError::InvalidInput(
                    "--max-restart-delay must not be shorter than --restart-delay".to_string(),
                ));
            }
            RestartPolicy::ExponentialBackoff {
                initial: restart_delay,
                max,
            }
        }
        None => RestartPolicy::Fixed(restart_delay),
    };

    match restart_policy {
        RestartPolicy::Fixed(delay) => {
            info!("Restart delay: {}", format_duration(delay))
        }
        RestartPolicy::ExponentialBackoff { initial, max } => info!(
            "Restart delay: {} doubling up to {}",
            format_duration(initial),
            format_duration(max)
        ),
    }

    Ok(FollowerConfig::builder()
        .with_base_config(download_config)
        .playlist_fetch_timeout(Duration::from_secs(args.playlist_timeout))
        .max_variant_depth(args.max_variant_depth)
        .variant_selection_policy(variant_policy)
        .initial_segment_policy(initial_policy)
        .idle_interval(parse_duration(&args.idle_interval)?)
        .poll_interval(poll_interval)
        .segment_download_timeout(Duration::from_secs(args.segment_timeout))
        .segment_retry_count(args.segment_retries)
        .segment_retry_delay(parse_duration(&args.segment_retry_delay)?)
        .output_dir(&args.output_dir)
        .write_retries(args.write_retries)
        .restart_policy(restart_policy)
        .max_restarts(args.max_restarts)
        .build())
}

async fn run_preload(
    follower: &PlaylistFollower,
    url: &str,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(url, "Preload cancelled");
            Ok(())
        }
        report = follower.preload(url) => {
            let report = report?;
            info!(
                "Preloaded {} segments ({}) from {} playlists",
                report.segments,
                format_bytes(report.bytes),
                report.playlists
            );
            Ok(())
        }
    }
}

/// Cancel `cancel` on Ctrl-C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => return,
    }

    info!("Shutdown signal received, stopping after the current poll");
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["hls-follow"];
        argv.extend_from_slice(extra);
        argv.push("http://origin/live/stream.m3u8");
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_follower_config_from_defaults() {
        let args = args(&[]);
        let config = build_follower_config(&args, build_download_config(&args).unwrap()).unwrap();

        assert_eq!(config.poll_config.idle_interval, Duration::from_secs(1));
        assert!(config.poll_config.poll_interval.is_none());
        assert_eq!(
            config.restart_config.policy,
            RestartPolicy::Fixed(Duration::from_secs(5))
        );
        assert_eq!(
            config.playlist_config.initial_segment_policy,
            InitialSegmentPolicy::SkipExisting
        );
        assert_eq!(
            config.fetcher_config.segment_retry_delay_base,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_follower_config_backoff_and_policies() {
        let args = args(&[
            "--restart-delay",
            "2s",
            "--max-restart-delay",
            "1m",
            "--max-restarts",
            "3",
            "--variant",
            "highest",
            "--download-existing",
            "--poll-interval",
            "1.5",
        ]);
        let config = build_follower_config(&args, DownloaderConfig::default()).unwrap();

        assert_eq!(
            config.restart_config.policy,
            RestartPolicy::ExponentialBackoff {
                initial: Duration::from_secs(2),
                max: Duration::from_secs(60),
            }
        );
        assert_eq!(config.restart_config.max_restarts, Some(3));
        assert_eq!(
            config.playlist_config.variant_selection_policy,
            VariantSelectionPolicy::HighestBitrate
        );
        assert_eq!(
            config.playlist_config.initial_segment_policy,
            InitialSegmentPolicy::DownloadExisting
        );
        assert_eq!(
            config.poll_config.poll_interval,
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_backoff_cap_below_initial_is_rejected() {
        let args = args(&["--restart-delay", "10s", "--max-restart-delay", "5s"]);
        assert!(build_follower_config(&args, DownloaderConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_run_returns_configuration_errors() {
        let args = args(&["--restart-delay", "10s", "--max-restart-delay", "5s"]);
        let err = run(&args).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_proxy_credentials_must_be_paired() {
        let args = args(&["--proxy", "http://proxy:8080", "--proxy-user", "me"]);
        assert!(build_download_config(&args).is_err());
    }
}
