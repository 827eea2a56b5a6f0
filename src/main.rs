use std::env;
use std::thread::{self, sleep};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info, warn};

use rfs_serial_link::config::{AppConfig, USAGE};
use rfs_serial_link::payload::*;
use rfs_serial_link::stdio_helper::*;
use rfs_serial_link::transport::*;
use rfs_serial_link::{Message, MessageType, MessageWriter, RfsLink, logging};

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Globals
// —————————————————————————————————————————————————————————————————————————————————————————————————

const UI_REFRESH: Duration = Duration::from_millis(50);

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                              Main
// —————————————————————————————————————————————————————————————————————————————————————————————————

fn main() {
    let mut config = match AppConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    if config.help {
        print!("{USAGE}");
        return;
    }

    logging::init();

    if let Err(e) = ctrl_c_init(config.ui) {
        error!(error = %e, "failed to set Ctrl-C handler");
    }

    if config.ui {
        if let Err(e) = stdout_init() {
            warn!(error = %e, "terminal setup failed, falling back to plain output");
            config.ui = false;
        }
    }

    println!("\n=== RFS Serial Link Started ===");
    println!("    crc: {:?} | baud: {}\n", config.link.variant, config.baud_rate);

    loop {
        if config.port.is_empty() {
            info!("port not provided, connecting to largest port number");
        }

        match serialport::available_ports() {
            Ok(ports) => {
                let names: Vec<&str> = ports.iter().map(|p| p.port_name.as_str()).collect();
                info!(available = ?names, "ports");
            }
            Err(e) => warn!(error = %e, "no ports"),
        }

        let port_name = match find_port(&config.port) {
            Ok(name) => name,
            Err(e) => {
                error!("{e:#}");
                sleep(Duration::from_secs(1));
                continue;
            }
        };

        let port = match connect_to_port(&port_name, config.baud_rate) {
            Ok(p) => p,
            Err(e) => {
                error!("{e:#}");
                continue;
            }
        };

        if let Err(e) = run_session(&config, &port_name, port) {
            error!("{e:#}");
            warn!("disconnected, retrying connection");
            continue;
        }
    }
}

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Session
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// One connection: receiver thread, parser thread, UI/stats on the calling thread.
///
/// Returns once the receiver gave up on the port.
fn run_session(config: &AppConfig, port_name: &str, port: PortType) -> Result<()> {
    let mut cmd_port = port.try_clone_native().context("Failed to clone port for writing")?;
    let mut writer = MessageWriter::new(config.link.variant);

    let mut link = RfsLink::new(config.link);
    for msg_type in MessageType::ALL {
        link.on_message(msg_type, log_message);
    }

    let stats = link.shared_stats();
    let stop = StopFlag::new();

    let receiver = spawn_receiver(port, link.input(), stop.clone(), DEFAULT_MAX_CONSECUTIVE_ERRORS);

    let parser_stop = stop.clone();
    let parser = thread::spawn(move || link.run(&parser_stop));

    let mut input = InputLine::new();
    let mut last_stats = Instant::now();

    while !receiver.is_finished() {
        if config.ui {
            match input.poll() {
                Ok(Some(line)) => send_command(&mut writer, &mut cmd_port, &line),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "stdin read failed"),
            }
            print_status_bar(
                &format_status_line(port_name, &stats.snapshot()),
                &format_input_line(input.current()),
            )?;
        }
        else if last_stats.elapsed() >= config.stats_interval {
            info!("{}", stats.snapshot());
            last_stats = Instant::now();
        }

        sleep(UI_REFRESH);
    }

    stop.stop();
    if parser.join().is_err() {
        error!("parser thread panicked");
    }

    match receiver.join() {
        Ok(result) => result,
        Err(_) => bail!("Receiver thread panicked"),
    }
}

fn send_command(writer: &mut MessageWriter, port: &mut PortType, line: &str) {
    let request = match line.parse::<CommandRequest>() {
        Ok(request) => request,
        Err(e) => {
            warn!("{e}");
            return;
        }
    };

    match writer.send(port, MessageType::CommandRequest, &request.encode()) {
        Ok(seq) => info!(command = %request.kind, seq, "command sent"),
        Err(e) => warn!("{e:#}"),
    }
}

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                          Process Data
// —————————————————————————————————————————————————————————————————————————————————————————————————

fn log_message(msg: &Message) -> Result<()> {
    let seq = msg.sequence_id;

    match Payload::parse(msg)? {
        Payload::Frame(frame) => {
            let img = frame.decode_image()?;
            info!(
                seq,
                kind = ?frame.kind,
                width = img.width(),
                height = img.height(),
                bytes = frame.data.len(),
                "frame"
            );
        }
        Payload::Detections(results) => {
            let best = results
                .detections
                .iter()
                .map(|d| d.confidence)
                .fold(0.0f32, f32::max);
            info!(seq, frame_id = results.frame_id, count = results.detections.len(), best, "detections");
            for det in &results.detections {
                debug!(
                    class = det.class_id,
                    x = det.x,
                    y = det.y,
                    w = det.width,
                    h = det.height,
                    conf = det.confidence,
                    keypoints = det.keypoints.len(),
                    "detection"
                );
            }
        }
        Payload::Embedding(emb) => {
            info!(seq, len = emb.len(), norm = emb.l2_norm(), "embedding");
        }
        Payload::Metrics(metrics) => info!(seq, "{metrics}"),
        Payload::Heartbeat(hb) => debug!(seq, tick_ms = hb.tick_ms, "heartbeat"),
        Payload::Error(text) => warn!(seq, "device error: {text}"),
        Payload::CommandRequest(req) => debug!(seq, command = %req.kind, "echoed command request"),
        Payload::CommandResponse(resp) => {
            if resp.is_ok() {
                info!(seq, command = %resp.kind, data = resp.data.len(), "command ok");
            }
            else {
                warn!(seq, command = %resp.kind, status = resp.status, "command failed");
            }
        }
        Payload::Debug(text) => info!(seq, "device: {text}"),
    }

    Ok(())
}
