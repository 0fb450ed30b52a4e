//! Drive a session against the scripted mock tracker and print what it reports.
//!
//! Usage: RUST_LOG=debug cargo run --example mock_session

use std::time::Duration;
use xslam::mock::MockTracker;
use xslam::{protocol, DeviceSession, Notification, SessionConfig, XslamError};

fn main() {
    env_logger::init();

    let mut tracker = MockTracker::new();
    tracker.camera_code = protocol::CAMERA_XR50;
    tracker.init_delay = Duration::from_millis(200);
    tracker.map_quality = 64;
    tracker.visibility = 0.8;

    let mut session = DeviceSession::with_config(tracker, SessionConfig::from_env());
    let notifications = session.subscribe();

    println!("Initializing tracker...");
    let pending = match session.spawn_initialize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to start initialize: {}", e);
            std::process::exit(1);
        }
    };
    let outcome = match pending.wait() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Initialize lost: {}", e);
            std::process::exit(1);
        }
    };
    let mut session = outcome.session;
    if let Err(e) = outcome.result {
        eprintln!("Failed to initialize: {}", e);
        std::process::exit(1);
    }
    println!("Camera model: {:?}", session.camera_model());

    if let Err(e) = session.load_map("demo.map") {
        eprintln!("Load map refused: {}", e);
    }

    for frame in 0u32..60 {
        let native = session.native_mut();
        match frame {
            5 => native.push_event(protocol::EVENT_MAP_SWITCHED),
            10 => native.push_event(protocol::EVENT_LOCALIZED),
            // Tracker freezes from frame 20 on.
            f if f < 20 => {
                let x = f as f64 * 0.01;
                native.set_pose([x, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]);
            }
            _ => {}
        }

        match session.pump_with_pose() {
            Ok(Some(pose)) => {
                if frame % 10 == 0 {
                    println!(
                        "frame={:<3} pos=[{:+.3}, {:+.3}, {:+.3}]",
                        frame, pose.position[0], pose.position[1], pose.position[2]
                    );
                }
            }
            Ok(None) => println!("frame={:<3} tracker not ready", frame),
            Err(XslamError::PoseStale) => {
                println!("frame={:<3} pose stale, tracking lost", frame);
                break;
            }
            Err(e) => eprintln!("frame={:<3} error: {}", frame, e),
        }

        for n in notifications.try_iter() {
            match n {
                Notification::Localized { visibility } => {
                    println!("Localized, visibility {:.0}%", visibility * 100.0)
                }
                other => println!("{:?}", other),
            }
        }

        std::thread::sleep(Duration::from_millis(33));
    }

    if let Err(e) = session.stop() {
        eprintln!("Stop failed: {}", e);
    }
}
