#![deny(unsafe_code)]

//! Pushes a simulated delivery queue of frozen messages through serialization and
//! payload reads, then reports how long each phase took and how many wire bytes
//! the queue pins.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use structopt::StructOpt;

use cometd::anyhow::{anyhow, Result};
use cometd::codec::{JsonCodec, SerdeJsonCodec};
use cometd::conf::{Options, Settings};
use cometd::logger::logger_init;
use cometd::serde_json::Value;
use cometd::utils::Bytesize;
use cometd::{log, Message, MessageFactory, WeakMessage};

const INVENTORY_UPDATE: &str = include_str!("inventory_update.json");

#[derive(StructOpt, Debug)]
#[structopt(name = "cometd-bench", about = "Measure frozen message serialization and payload reads")]
struct Args {
    #[structopt(flatten)]
    opts: Options,

    /// Number of messages held in the simulated delivery queue
    #[structopt(long, default_value = "50000")]
    count: usize,

    /// JSON object used as every message payload, defaults to a built-in inventory update
    #[structopt(long, parse(from_os_str))]
    payload: Option<PathBuf>,

    /// Keep the producer's payload handles alive while the queue drains
    #[structopt(long)]
    retain: bool,
}

#[derive(Debug, Default)]
struct Report {
    messages: usize,
    compressed: usize,
    raw_bytes: usize,
    json_bytes: usize,
    data_hits: usize,
    produce: Duration,
    serialize: Duration,
    read: Duration,
}

fn main() {
    let args = Args::from_args();

    //init config
    let settings = Settings::init(args.opts.clone()).expect("settings init failed");

    //init log
    let _logger = logger_init(&settings.log).expect("logger init failed");
    Settings::logs().expect("settings logs failed");

    match run(settings, &args) {
        Ok(report) => print_report(&report),
        Err(e) => {
            log::error!("benchmark failed, {e:?}");
            eprintln!("benchmark failed, {e:?}");
            std::process::exit(1);
        }
    }
}

fn load_payload(codec: &dyn JsonCodec, path: Option<&PathBuf>) -> Result<Value> {
    let json = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow!("unable to read payload file {}, {e}", path.display()))?,
        None => INVENTORY_UPDATE.to_owned(),
    };
    Ok(Value::Object(codec.parse(&json)?))
}

fn run(settings: &Settings, args: &Args) -> Result<Report> {
    let codec: Arc<dyn JsonCodec> = Arc::new(SerdeJsonCodec);
    let payload = load_payload(codec.as_ref(), args.payload.as_ref())?;
    let factory = MessageFactory::from_conf(&settings.message, codec);

    log::info!(
        "building {} messages, zip threshold {:?}, retain payloads: {}",
        args.count,
        settings.message.zip_message_size_threshold,
        args.retain
    );

    let mut report = Report { messages: args.count, ..Default::default() };

    let now = Instant::now();
    let mut producer_handles = Vec::with_capacity(if args.retain { args.count } else { 0 });
    let queue = (0..args.count)
        .map(|i| {
            let data = Arc::new(payload.clone());
            if args.retain {
                producer_handles.push(data.clone());
            }
            let mut message = Message::new();
            message.set_channel(format!("/inventory/managedObjects/{i}"));
            message.set_id(i.to_string());
            message.set_client_id("cometd-bench");
            message.set_data(data);
            Arc::new(factory.freeze(&message))
        })
        .collect::<Vec<Arc<WeakMessage>>>();
    report.produce = now.elapsed();

    let now = Instant::now();
    for msg in queue.iter() {
        report.raw_bytes += msg.raw_data()?.len();
        report.json_bytes += msg.json_bytes()?.len();
        if msg.is_compressed() {
            report.compressed += 1;
        }
    }
    report.serialize = now.elapsed();

    let now = Instant::now();
    report.data_hits = queue.iter().filter(|msg| msg.data().is_some()).count();
    report.read = now.elapsed();

    log::info!("retained {} producer payload handles", producer_handles.len());
    log::debug!("{report:?}");
    Ok(report)
}

fn print_report(report: &Report) {
    println!("messages:        {}", report.messages);
    println!("compressed:      {}", report.compressed);
    println!("wire bytes:      {:?}", Bytesize(report.raw_bytes));
    println!("json bytes:      {:?}", Bytesize(report.json_bytes));
    println!("data readable:   {}", report.data_hits);
    println!("produce+freeze:  {:?}", report.produce);
    println!("serialize:       {:?}", report.serialize);
    println!("read data:       {:?}", report.read);
}
