use anyhow::Result;
use sixdof_remote::controller::PlatformController;
use sixdof_remote::domain::models::ControlMode;
use sixdof_remote::domain::settings::SettingsService;
use sixdof_remote::infrastructure::bluetooth::LinkManager;
use sixdof_remote::infrastructure::logging;
use sixdof_remote::infrastructure::sensors::{ImuEngine, NullSensorSource};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let mut settings = SettingsService::new()?;
    let _logging_guard = logging::init_logger(&settings.get().log_settings)?;
    info!("starting 6-DOF platform remote");

    let link = Arc::new(LinkManager::new().await?);
    let imu = Arc::new(ImuEngine::new(Box::new(NullSensorSource)));
    let controller = PlatformController::new(Arc::clone(&link), Arc::clone(&imu));
    controller.apply_settings(settings.get());
    let supervisor = controller.run(link.state());

    println!("6-DOF platform remote. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(' ') {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };
        match cmd {
            "" => {}
            "help" => print_help(),
            "scan" => {
                let _ = link.start_scan().await;
            }
            "stop" => {
                let _ = link.stop_scan().await;
            }
            "devices" => {
                let devices = link.devices().borrow().clone();
                if devices.is_empty() {
                    println!("no devices seen yet");
                }
                for device in devices {
                    println!("{}  {}  {} dBm", device.address, device.name, device.rssi);
                }
            }
            "connect" => {
                if arg.is_empty() {
                    println!("usage: connect <address>");
                } else if let Err(e) = link.connect(arg).await {
                    println!("connect failed: {e}");
                }
            }
            "disconnect" => link.disconnect().await,
            "status" => {
                println!("link: {:?}", link.current_state());
                if let Some(name) = link.connected_device_name().await {
                    println!("device: {name} (raw motion: {})", link.has_raw_motion_support().await);
                }
                let streaming = controller.streaming_state();
                println!(
                    "streaming: {}, packets sent: {}",
                    streaming.streaming, streaming.packets_sent
                );
                for entry in link.status_log().into_iter().take(10) {
                    println!("  [{:?}] {}", entry.severity, entry.message);
                }
            }
            "mode" => match arg {
                "manual" => controller.set_control_mode(ControlMode::Manual),
                "imu" => controller.set_control_mode(ControlMode::OrientationMapped),
                "raw" => controller.set_control_mode(ControlMode::RawMotion),
                _ => println!("usage: mode <manual|imu|raw>"),
            },
            "axis" => {
                let mut parts = arg.split_whitespace();
                match (
                    parts.next().and_then(|s| s.parse::<usize>().ok()),
                    parts.next().and_then(|s| s.parse::<f32>().ok()),
                ) {
                    (Some(index), Some(pct)) => controller.set_axis_value(index, pct),
                    _ => println!("usage: axis <0-5> <percent>"),
                }
            }
            "home" => controller.home_all_axes(),
            "rate" => match arg.parse::<u32>() {
                Ok(hz) => controller.set_send_rate(hz),
                Err(_) => println!("usage: rate <hz>"),
            },
            "angle" => match arg.parse::<f32>() {
                Ok(deg) => controller.set_imu_max_angle(deg),
                Err(_) => println!("usage: angle <degrees>"),
            },
            "sens" => match arg.parse::<f32>() {
                Ok(value) => controller.set_imu_sensitivity(value),
                Err(_) => println!("usage: sens <multiplier>"),
            },
            "zero" => controller.reset_imu_reference(),
            "cmd" => {
                if arg.is_empty() {
                    println!("usage: cmd <text>");
                } else if !controller.send_command(arg).await {
                    println!("command not sent (link down?)");
                }
            }
            "save" => {
                controller.store_settings(settings.get_mut());
                match settings.save() {
                    Ok(()) => println!("settings saved"),
                    Err(e) => println!("save failed: {e}"),
                }
            }
            "quit" | "exit" => break,
            other => println!("unknown command '{other}', try 'help'"),
        }
    }

    info!("shutting down");
    supervisor.abort();
    link.disconnect().await;
    imu.stop();
    Ok(())
}

fn print_help() {
    println!(
        "\
commands:
  scan / stop / devices      discovery
  connect <address>          connect to a platform
  disconnect                 drop the link
  status                     link, streaming and recent platform messages
  mode <manual|imu|raw>      control mode
  axis <0-5> <percent>       manual axis value (surge sway heave roll pitch yaw)
  home                       all manual axes to neutral
  rate <hz> / angle <deg> / sens <x>
  zero                       re-zero the orientation reference
  cmd <text>                 send an ASCII command to the platform
  save                       persist current settings
  quit"
    );
}
