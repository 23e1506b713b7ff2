//! button-events - print semantic button events from local input devices
//!
//! Reads keyboards, mice and HID controllers, and prints presses, releases,
//! repeats and multi-tap gestures as text or JSON lines.

use anyhow::Result;
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use button_events::{
    buttons::ButtonCode,
    clock::{Clock, MonotonicClock},
    config::OutputFormat,
    registry::DeviceGroup,
    source, ButtonEvent, Config, DeviceKind, DeviceRegistry, EventType, KeyCode, MultiTapEvent,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Using default config: {}", e);
            Config::default()
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let clock = MonotonicClock::new();
    let mut registry = DeviceRegistry::new(Rc::new(clock), config.clone())?;

    let format = config.host.output;
    subscribe_printers(registry.keyboards(), format);
    subscribe_printers(registry.mice(), format);
    subscribe_printers(registry.controllers(), format);

    let quit = Rc::new(Cell::new(false));
    if config.host.quit_on_triple_q {
        let quit = quit.clone();
        registry.keyboards().subscribe_buttons(move |event| {
            if event.button == KeyCode::Q
                && event.event_type == EventType::Pressed
                && event.repeat_count == 0
                && event.press_count >= 2
            {
                quit.set(true);
            }
        });
        log::info!("Press Q three times quickly to quit");
    }

    let mut input = source::open_default(config.host.use_evdev);
    log::info!("Listening with the {} source", input.name());

    let poll_interval = config.poll_interval();
    while running.load(Ordering::SeqCst) && !quit.get() {
        for transition in input.poll() {
            if let Err(e) = registry.process(transition) {
                log::error!("Stopping on rejected input {:?}: {}", transition, e);
                return Err(e.into());
            }
        }

        for device in input.take_disconnected() {
            let removed = registry.disconnect(device)?;
            log::info!("Device {} disconnected ({} table(s) dropped)", device, removed);
        }

        registry.poll_timers();

        let sleep = registry
            .next_deadline()
            .map(|due| Duration::from_millis(due.saturating_sub(clock.now_ms())))
            .map_or(poll_interval, |until_due| until_due.min(poll_interval));
        thread::sleep(sleep);
    }

    log::info!("Stopped after seeing {} device(s)", registry.device_count());
    Ok(())
}

fn subscribe_printers<B>(group: &DeviceGroup<B>, format: OutputFormat)
where
    B: ButtonCode + Serialize,
{
    let kind = group.kind();
    group.subscribe_buttons(move |event| match format {
        OutputFormat::Text => println!("{}", describe_button(kind, event)),
        OutputFormat::Json => print_json(kind, event),
    });
    group.subscribe_taps(move |event| match format {
        OutputFormat::Text => println!("{}", describe_taps(kind, event)),
        OutputFormat::Json => print_json(kind, event),
    });
}

#[derive(Serialize)]
struct JsonLine<'a, E> {
    kind: DeviceKind,
    #[serde(flatten)]
    event: &'a E,
}

fn print_json<E: Serialize>(kind: DeviceKind, event: &E) {
    match serde_json::to_string(&JsonLine { kind, event }) {
        Ok(line) => println!("{}", line),
        Err(e) => log::warn!("Failed to encode event: {}", e),
    }
}

fn describe_button<B: ButtonCode>(kind: DeviceKind, event: &ButtonEvent<B>) -> String {
    let action = match (event.event_type, event.repeat_count) {
        (EventType::Pressed, 0) => "pressed".to_string(),
        (EventType::Pressed, n) => format!("repeat #{} after {}ms", n, event.actuation_time_ms),
        (EventType::Released, _) => "released".to_string(),
    };
    format!(
        "[{:>8}ms] {} {} {} {} (press count {})",
        event.timestamp_ms, kind, event.device, event.button, action, event.press_count
    )
}

fn describe_taps<B: ButtonCode>(kind: DeviceKind, event: &MultiTapEvent<B>) -> String {
    let gesture = match event.tap_count {
        1 => "single tap".to_string(),
        2 => "double tap".to_string(),
        3 => "triple tap".to_string(),
        n => format!("{}x tap", n),
    };
    format!(
        "[{:>8}ms] {} {} {} {}",
        event.timestamp_ms, kind, event.device, event.button, gesture
    )
}
