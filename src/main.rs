use rustop::opts;
use log::{error, info};

mod group;
mod csv_decoder;
mod command_payload;
mod config_payload;
mod config_store;
mod dispatcher;
mod storage;
mod console;
mod mqtt;

use crate::config_store::{ConfigStore, LoadOutcome};
use crate::storage::{FileStorage, MemoryStorage, Storage};

pub struct Config {
    name: String,
    config_filename: String,
    root: String,
    emulation: bool,
}

impl Config {
    fn open_storage(&self) -> storage::Result<Box<dyn Storage>> {
        if self.emulation {
            MemoryStorage::try_new()
        } else {
            FileStorage::try_new(std::path::Path::new(&self.root))
        }
    }
}

#[tokio::main]
async fn main()  {
    let (args, _) = opts! {
        synopsis "Lighting group controller";
        opt mqtt:Option<String>, desc: "MQTT broker to receive commands from (default: read commands from the console)";
        opt name:String = String::from("group_controller"), desc: "Controller name";
        opt emulation:bool = false, desc: "Keep the group configuration in memory (for debugging)";
        opt root:String = String::from("."), desc: "Directory holding the group configuration (.)";
        opt config:String = String::from("groups.json"), desc: "Group configuration filename (groups.json)";
    }.parse_or_exit();

    let logging = match tracing_init::TracingInit::builder("group_controller")
        .log_to_file(true)
        .log_to_server(false)
        .log_file_prefix("groups")
        .log_file_path("logs")
        .init() {
        Ok(d) => d.to_string(),
        Err(e) => {
            eprintln!("Failed to initialize logging: {:?}", e);
            std::process::exit(1);
        }
    };

    println!("Logging: {}", logging);
    info!("Started: {}", get_version());

    let config = Config {
        name: args.name.clone(),
        config_filename: args.config.clone(),
        root: args.root.clone(),
        emulation: args.emulation,
    };

    let storage = match config.open_storage() {
        Ok(storage) => storage,
        Err(e) => {
            error!("Cannot open storage: {:?}", e);
            eprintln!("Cannot open storage {}: {}", config.root, e);
            std::process::exit(1);
        }
    };

    println!("Loading configuration from {config_filename}{existing}",
        config_filename = config.config_filename,
        existing = if storage.exists(&config.config_filename) { "" } else { " (not found, creating default)" });

    let mut store = ConfigStore::new(storage, &config.config_filename);

    match store.load() {
        LoadOutcome::Loaded => println!("Configuration: loaded"),
        LoadOutcome::Initialized => println!("Configuration: created"),
        LoadOutcome::Failed => println!("Configuration: could not be read, using defaults"),
    }

    let result = match args.mqtt {
        Some(ref broker) => {
            let mut mqtt = mqtt::MqttGroups::new(&mut store, &config.name, broker);
            mqtt.run().await
        }
        None => console::run(&mut store).await.map_err(|e| e.into()),
    };

    if let Err(e) = result {
        error!("Terminated with error: {}", e);
        eprintln!("Terminated with error: {}", e);
        std::process::exit(1);
    }
}

pub fn get_version() -> String {
    format!("group_controller: {} (built at {})", built_info::PKG_VERSION, built_info::BUILT_TIME_UTC)
}
// Include the generated-file as a separate module
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
