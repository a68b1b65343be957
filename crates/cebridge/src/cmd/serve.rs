use cebridge_relay::{RelayServer, ServerConfig, ShutdownHandle};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{relay_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = ServerConfig::new(args.bind.clone(), args.port).with_channel(args.channel.clone());

    #[cfg(feature = "async")]
    if args.use_async {
        return run_async(&config);
    }

    let server = RelayServer::bind(&config).map_err(|err| relay_error("bind failed", err))?;
    install_ctrlc_handler(server.shutdown_handle())?;
    info!(addr = %server.local_addr(), channel = %config.channel, "serving; press Ctrl-C to stop");

    server
        .serve()
        .map_err(|err| relay_error("serve failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(handle: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        handle.shutdown();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(feature = "async")]
fn run_async(config: &ServerConfig) -> CliResult<i32> {
    use cebridge_relay::AsyncRelayServer;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| crate::exit::io_error("runtime setup failed", err))?;

    runtime.block_on(async {
        let server = AsyncRelayServer::bind(config)
            .await
            .map_err(|err| relay_error("bind failed", err))?;
        info!(
            addr = %server.local_addr(),
            channel = %config.channel,
            "serving (async); press Ctrl-C to stop"
        );
        server
            .serve(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .map_err(|err| relay_error("serve failed", err))?;
        Ok(SUCCESS)
    })
}
