// module-demo: a minimal module that bootstraps against an orchestrator,
// prefetches one secret, and serves a single `/ping` endpoint by replying
// to routed messages from other modules.

use std::collections::HashMap;

use module_sdk::bootstrap::{BootstrapOptions, StateBuilder};
use rt_wire::{EndpointAnnounce, InitBlob};
use tracing::info;

struct DemoState;

impl StateBuilder for DemoState {
    fn build(&self, init: &InitBlob, secrets: &HashMap<String, String>) -> Vec<EndpointAnnounce> {
        info!(module_id = %init.module_id, secrets = secrets.len(), "building demo state");
        vec![EndpointAnnounce { path: "/ping".to_owned(), methods: vec!["GET".to_owned()], auth: None }]
    }
}

#[tokio::main]
async fn main() {
    let options = BootstrapOptions { declared_secrets: vec!["demo_api_key".to_owned()] };

    let (_state, dispatcher, mut channel) = match module_sdk::bootstrap(options, &DemoState).await {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("FATAL: bootstrap failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = dispatcher.run(&mut channel).await {
        eprintln!("FATAL: dispatcher loop failed: {e}");
        std::process::exit(1);
    }
}
