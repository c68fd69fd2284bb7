use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;

/// Background task that raises the shared shutdown flag.
///
/// The render loop never awaits anything; it only polls the flag between
/// iterations.
pub struct EventHandler {
    _task: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    /// Watch terminal input for a quit key.
    pub fn spawn(shutdown: Arc<AtomicBool>) -> Self {
        let task = tokio::spawn(async move {
            let mut reader = EventStream::new();
            while let Some(event) = reader.next().await {
                match event {
                    Ok(event) if is_quit(&event) => {
                        tracing::info!("quit requested from terminal");
                        shutdown.store(true, Ordering::Relaxed);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "terminal event stream failed");
                        shutdown.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }
        });

        Self { _task: task }
    }

    /// Headless runs have no terminal input; wait for SIGINT instead.
    pub fn spawn_signal(shutdown: Arc<AtomicBool>) -> Self {
        let task = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("interrupt received"),
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for interrupts");
                    return;
                }
            }
            shutdown.store(true, Ordering::Relaxed);
        });

        Self { _task: task }
    }
}

pub fn is_quit(event: &Event) -> bool {
    match event {
        Event::Key(key) => is_quit_key(key),
        _ => false,
    }
}

pub fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}
