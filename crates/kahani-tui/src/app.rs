use kahani_core::{
    drive_generation, BackendClient, ChatController, ChatUpdate, Config,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Last known result of the backend health check
#[derive(Debug, Clone, PartialEq)]
pub enum BackendStatus {
    Unknown,
    Checking,
    Ok(serde_json::Value),
    Unreachable(String),
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Prefix input
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Conversation
    pub controller: ChatController,
    pub client: BackendClient,
    pub generation_task: Option<JoinHandle<()>>,
    pub backend_status: BackendStatus,

    // Chat scrolling
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_output: bool,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Queues back into the main loop
    events: mpsc::UnboundedSender<AppEvent>,
    chat_updates: mpsc::UnboundedSender<ChatUpdate>,
}

impl App {
    pub fn new(
        client: BackendClient,
        controller: ChatController,
        events: mpsc::UnboundedSender<AppEvent>,
        chat_updates: mpsc::UnboundedSender<ChatUpdate>,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            controller,
            client,
            generation_task: None,
            backend_status: BackendStatus::Unknown,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_output: true,
            chat_area: None,

            animation_frame: 0,

            events,
            chat_updates,
        }
    }

    /// Send the current input as a story prefix. Ignored while a generation
    /// is running or when the input is blank.
    pub fn submit_input(&mut self) {
        let Some(pending) = self.controller.submit(&self.input) else {
            return;
        };

        self.input.clear();
        self.cursor = 0;
        self.follow_output = true;
        self.scroll_chat_to_bottom();

        let client = self.client.clone();
        let tx = self.chat_updates.clone();
        let idle_timeout = self.controller.idle_timeout();
        self.generation_task = Some(tokio::spawn(async move {
            drive_generation(client, pending, tx, idle_timeout).await;
        }));
    }

    /// Stop the running generation, keeping whatever text already arrived.
    pub fn cancel_generation(&mut self) {
        if let Some(handle) = self.generation_task.take() {
            handle.abort();
        }
        if let Some(id) = self.controller.cancel() {
            tracing::info!("Generation {} cancelled by user", id);
        }
    }

    pub fn apply_update(&mut self, update: ChatUpdate) {
        self.controller.apply(update);
        if !self.controller.is_generating() {
            self.generation_task = None;
        }
        if self.follow_output {
            self.scroll_chat_to_bottom();
        }
    }

    pub fn check_health(&mut self) {
        self.backend_status = BackendStatus::Checking;
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let status = match client.health().await {
                Ok(value) => BackendStatus::Ok(value),
                Err(e) => BackendStatus::Unreachable(e.to_string()),
            };
            let _ = tx.send(AppEvent::Health(status));
        });
    }

    pub fn increase_max_length(&mut self) {
        self.controller.increase_max_length();
        self.persist_max_length();
    }

    pub fn decrease_max_length(&mut self) {
        self.controller.decrease_max_length();
        self.persist_max_length();
    }

    fn persist_max_length(&self) {
        if let Err(e) = Config::save_max_length(self.controller.max_length()) {
            tracing::warn!("Could not save max_length: {}", e);
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.controller.is_generating() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self) {
        let max = self.max_scroll();
        self.chat_scroll = (self.chat_scroll + 1).min(max);
        self.follow_output = self.chat_scroll >= max;
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
        self.follow_output = false;
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_output = false;
    }

    /// Scroll chat to bottom so the newest tokens are visible
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
        self.follow_output = true;
    }

    fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.total_chat_lines().saturating_sub(visible_height)
    }

    /// Rendered line count of the chat pane, including wrapping
    pub fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.controller.messages() {
            total_lines = total_lines.saturating_add(1); // Role line
            let mut content_lines: u16 = 0;
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                content_lines = content_lines.saturating_add((char_count / wrap_width + 1) as u16);
            }
            // An empty placeholder still renders the "Generating..." line
            total_lines = total_lines.saturating_add(content_lines.max(1));
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        total_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kahani_core::ChatRole;

    fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>, mpsc::UnboundedReceiver<ChatUpdate>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (chat_tx, chat_rx) = mpsc::unbounded_channel();
        // Nothing listens here; requests fail fast
        let client = BackendClient::new("http://127.0.0.1:9");
        let app = App::new(client, ChatController::default(), events_tx, chat_tx);
        (app, events_rx, chat_rx)
    }

    #[tokio::test]
    async fn test_submit_clears_input_and_spawns_generation() {
        let (mut app, _events, _chat) = test_app();
        app.input = "ایک دن".to_string();
        app.cursor = 6;

        app.submit_input();

        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert_eq!(app.controller.messages().len(), 2);
        assert!(app.generation_task.is_some());

        app.cancel_generation();
    }

    #[tokio::test]
    async fn test_blank_input_is_not_submitted() {
        let (mut app, _events, _chat) = test_app();
        app.input = "   ".to_string();

        app.submit_input();

        assert!(app.controller.messages().is_empty());
        assert!(app.generation_task.is_none());
        assert_eq!(app.input, "   ");
    }

    #[tokio::test]
    async fn test_failed_generation_reaches_ui_queue() {
        let (mut app, _events, mut chat) = test_app();
        app.input = "prefix".to_string();
        app.submit_input();

        while app.controller.is_generating() {
            let update = chat.recv().await.expect("generation reports until finished");
            app.apply_update(update);
        }

        assert_eq!(app.controller.messages()[1].role, ChatRole::Error);
        assert!(app.generation_task.is_none());
    }

    #[tokio::test]
    async fn test_cancel_clears_in_flight() {
        let (mut app, _events, _chat) = test_app();
        app.input = "prefix".to_string();
        app.submit_input();

        app.cancel_generation();

        assert!(!app.controller.is_generating());
        assert!(app.generation_task.is_none());
    }

    #[tokio::test]
    async fn test_scrolling_stops_following() {
        let (mut app, _events, _chat) = test_app();
        app.chat_height = 2;
        app.chat_width = 10;
        app.controller.submit("one").unwrap();

        app.scroll_chat_to_bottom();
        let bottom = app.chat_scroll;
        assert!(bottom > 0);

        app.scroll_up();
        assert!(!app.follow_output);
        app.scroll_down();
        assert_eq!(app.chat_scroll, bottom);
        assert!(app.follow_output);
    }
}
