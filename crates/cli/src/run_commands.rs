//! `gotify-slack run` and `gotify-slack check`.

use std::sync::Arc;

use {
    anyhow::{Context, Result, bail},
    gotify_slack_bridge::{BridgeState, SlackBridgePlugin},
    gotify_slack_config::AppConfig,
    gotify_slack_gotify::GotifyNotifier,
    gotify_slack_slack::SlackRtmService,
    tracing::{info, warn},
};

fn build_plugin(config: &AppConfig) -> Result<SlackBridgePlugin> {
    let notifier = GotifyNotifier::new(&config.gotify.url, config.gotify.token.clone())
        .context("invalid gotify configuration")?;
    Ok(SlackBridgePlugin::new(
        Arc::new(SlackRtmService::new()),
        Arc::new(notifier),
    ))
}

/// What the host does once the session reaches `state`.
enum Next {
    Continue,
    Exit,
    Fail,
}

fn next_step(state: &BridgeState) -> Next {
    match state {
        BridgeState::FatalAuthError | BridgeState::Failed { .. } => Next::Fail,
        BridgeState::Disconnected => Next::Exit,
        BridgeState::Idle | BridgeState::Connecting | BridgeState::Streaming { .. } => {
            Next::Continue
        },
    }
}

/// Stream until Ctrl-C or until the session ends.
pub async fn handle_run(config: AppConfig) -> Result<()> {
    let plugin = build_plugin(&config)?;
    let mut states = plugin.subscribe();

    plugin.set_config(config.slack).await?;
    plugin.enable().await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("shutting down");
                return plugin.disable().await.map_err(Into::into);
            },
            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = states.borrow_and_update().clone();
                info!(state = %state, "bridge state changed");
                match next_step(&state) {
                    Next::Continue => {},
                    Next::Exit => {
                        plugin.disable().await?;
                        return Ok(());
                    },
                    Next::Fail => {
                        if let Err(e) = plugin.disable().await {
                            warn!(error = %e, "cleanup after bridge failure failed");
                        }
                        bail!("slack bridge stopped: {state}");
                    },
                }
            },
        }
    }
}

/// Validate the configured token and print the status block.
pub async fn handle_check(config: AppConfig) -> Result<()> {
    let plugin = build_plugin(&config)?;
    let outcome = plugin.set_config(config.slack).await;
    println!("{}", plugin.status_display().await);
    outcome.context("slack token check failed")?;
    if !plugin.has_credential().await {
        bail!("no slack token configured");
    }
    Ok(())
}
