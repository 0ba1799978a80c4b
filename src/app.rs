use crate::config::{self, EXAMPLE_PROMPTS, MOOD_OPTIONS, THUMBNAIL_SIZE};
use crate::event::{ApiStatus, AppEvent};
use crate::gemini::{extract_prompt_section, GeminiClient, MoodReport};
use crate::imaging::{self, watermark};
use crate::studio::{store, ImageRecord, SpotPoint, StudioState};
use crate::theme::Theme;
use eframe::egui::{self, Color32, RichText, ScrollArea, TextureHandle, Vec2};
use image::DynamicImage;
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatRole {
    User,
    Designer,
}

#[derive(Debug, Clone)]
struct ChatMessage {
    role: ChatRole,
    content: String,
}

pub struct HomeCanvasApp {
    rx: Receiver<AppEvent>,
    gemini: GeminiClient,
    theme: Theme,
    api_status: ApiStatus,
    studio: StudioState,
    textures: HashMap<Uuid, TextureHandle>,
    thumb_textures: HashMap<Uuid, TextureHandle>,
    prompt_buffer: String,
    chat_input: String,
    chat_transcript: Vec<ChatMessage>,
    chat_waiting: bool,
    selected_mood: usize,
    mood_report: Option<MoodReport>,
    mood_waiting: bool,
    is_generating: bool,
    loading_message: String,
    error: Option<String>,
    spot_mode: bool,
    pending_spot: Option<SpotPoint>,
    spot_prompt: String,
    show_download_modal: bool,
    diagnostics_log: Vec<String>,
    scroll_chat_to_bottom: bool,
}

impl HomeCanvasApp {
    pub fn new(rx: Receiver<AppEvent>, gemini: GeminiClient) -> Self {
        let (studio, warning) = store::load();
        let mut app = Self {
            rx,
            gemini,
            theme: Theme::default(),
            api_status: ApiStatus::Unconfigured,
            studio: studio.unwrap_or_default(),
            textures: HashMap::new(),
            thumb_textures: HashMap::new(),
            prompt_buffer: String::new(),
            chat_input: String::new(),
            chat_transcript: Vec::new(),
            chat_waiting: false,
            selected_mood: 0,
            mood_report: None,
            mood_waiting: false,
            is_generating: false,
            loading_message: String::new(),
            error: None,
            spot_mode: false,
            pending_spot: None,
            spot_prompt: String::new(),
            show_download_modal: false,
            diagnostics_log: Vec::new(),
            scroll_chat_to_bottom: false,
        };
        if let Some(warning) = warning {
            app.log_diagnostic(format!("state restore warning: {warning}"));
        }
        app
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn status_label(&self) -> (&'static str, Color32) {
        match self.api_status {
            ApiStatus::Ready => ("API Ready", self.theme.success),
            ApiStatus::Unconfigured => ("API Key Missing", self.theme.warning),
            ApiStatus::Erroring => ("API Error", self.theme.danger),
        }
    }

    fn persist(&mut self) {
        if self.studio.is_empty() {
            store::clear();
            return;
        }
        if let Err(err) = store::save(&self.studio) {
            self.log_diagnostic(format!("failed to persist studio state: {err}"));
        }
    }

    // ---- uploads -------------------------------------------------------

    fn upload_from_path(&mut self, path: &Path) {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.error = Some(format!("Could not read {}: {err}", path.display()));
                return;
            }
        };
        let format = match imaging::validate_upload(&bytes) {
            Ok(format) => format,
            Err(err) => {
                self.error = Some(err.to_string());
                return;
            }
        };
        let image = match imaging::decode(&bytes) {
            Ok(image) => image,
            Err(err) => {
                self.error = Some(err.to_string());
                return;
            }
        };

        let data_url = imaging::to_data_url(&bytes, format);
        let thumbnail = match imaging::thumbnail_data_url(&image, THUMBNAIL_SIZE) {
            Ok(thumb) => Some(thumb),
            Err(err) => {
                log::warn!("thumbnail generation failed: {err}");
                None
            }
        };

        self.studio
            .load_original(ImageRecord::original(data_url, thumbnail));
        self.error = None;
        self.mood_report = None;
        self.pending_spot = None;
        self.spot_mode = false;
        self.log_diagnostic(format!(
            "image uploaded ({} bytes, {:?})",
            bytes.len(),
            format
        ));
        self.persist();
    }

    fn open_upload_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "webp"])
            .pick_file()
        {
            self.upload_from_path(&path);
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(path) = dropped.into_iter().find_map(|f| f.path) {
            self.upload_from_path(&path);
        }
    }

    // ---- request launchers ---------------------------------------------

    fn submit_design_prompt(&mut self) {
        let prompt = self.prompt_buffer.trim().to_string();
        if let Err(err) = config::validate_prompt(&prompt) {
            self.error = Some(err);
            return;
        }
        let Some(payload) = self
            .studio
            .current
            .as_ref()
            .and_then(|c| c.base64_payload().map(str::to_string))
        else {
            self.error = Some("Unable to process image for API call".to_string());
            return;
        };

        self.is_generating = true;
        self.error = None;
        self.log_diagnostic(format!("design requested ({} chars)", prompt.len()));
        self.gemini.generate_design(payload, prompt);
        self.prompt_buffer.clear();
    }

    fn submit_spot_edit(&mut self) {
        let prompt = self.spot_prompt.trim().to_string();
        if prompt.is_empty() {
            return;
        }
        let Some(spot) = self.pending_spot else {
            return;
        };
        let Some(data_url) = self.studio.current.as_ref().map(|c| c.data_url.clone()) else {
            return;
        };

        self.is_generating = true;
        self.error = None;
        self.log_diagnostic(format!(
            "spot edit requested at ({:.1}%, {:.1}%)",
            spot.x, spot.y
        ));
        self.gemini.spot_edit(data_url, spot, prompt);
    }

    fn submit_chat(&mut self, ctx: &egui::Context) {
        let message = self.chat_input.trim().to_string();
        if message.is_empty() {
            return;
        }
        self.chat_transcript.push(ChatMessage {
            role: ChatRole::User,
            content: message.clone(),
        });
        let room_image = self.studio.current.as_ref().map(|c| c.data_url.clone());
        self.gemini.chat(message, room_image);
        self.chat_waiting = true;
        self.chat_input.clear();
        self.scroll_chat_to_bottom = true;
        ctx.request_repaint();
    }

    fn submit_mood_analysis(&mut self) {
        let Some(data_url) = self.studio.current.as_ref().map(|c| c.data_url.clone()) else {
            return;
        };
        let (mood, _) = MOOD_OPTIONS[self.selected_mood.min(MOOD_OPTIONS.len() - 1)];
        self.mood_waiting = true;
        self.mood_report = None;
        self.gemini.analyze_mood(data_url, mood.to_string());
    }

    fn clear_all(&mut self) {
        self.studio.clear();
        store::clear();
        self.textures.clear();
        self.thumb_textures.clear();
        self.mood_report = None;
        self.pending_spot = None;
        self.spot_mode = false;
        self.error = None;
        self.log_diagnostic("studio cleared");
    }

    // ---- events ---------------------------------------------------------

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn record_thumbnail(&mut self, data_url: &str) -> Option<String> {
        match imaging::decode_data_url(data_url) {
            Ok(image) => match imaging::thumbnail_data_url(&image, THUMBNAIL_SIZE) {
                Ok(thumb) => Some(thumb),
                Err(err) => {
                    log::warn!("thumbnail generation failed: {err}");
                    None
                }
            },
            Err(err) => {
                log::warn!("generated image did not decode: {err}");
                None
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::StatusChanged(status) => {
                self.api_status = status;
                self.log_diagnostic(format!("api status: {status:?}"));
            }
            AppEvent::Progress(message) => {
                self.loading_message = message;
                ctx.request_repaint();
            }
            AppEvent::DesignReady { data_url, prompt } => {
                let thumbnail = self.record_thumbnail(&data_url);
                self.studio.record_design(data_url, thumbnail, &prompt);
                self.is_generating = false;
                self.loading_message.clear();
                self.log_diagnostic("design generated");
                self.persist();
                ctx.request_repaint();
            }
            AppEvent::DesignFailed(message) => {
                self.is_generating = false;
                self.loading_message.clear();
                self.log_diagnostic(format!("design failed: {message}"));
                self.error = Some(message);
            }
            AppEvent::ChatReply(reply) => {
                self.chat_waiting = false;
                self.chat_transcript.push(ChatMessage {
                    role: ChatRole::Designer,
                    content: reply,
                });
                self.scroll_chat_to_bottom = true;
                ctx.request_repaint();
            }
            AppEvent::ChatFailed(message) => {
                self.chat_waiting = false;
                self.log_diagnostic(format!("chat failed: {message}"));
                self.error = Some(message);
            }
            AppEvent::MoodReady(report) => {
                self.mood_waiting = false;
                self.mood_report = Some(report);
                ctx.request_repaint();
            }
            AppEvent::MoodFailed(message) => {
                self.mood_waiting = false;
                self.log_diagnostic(format!("mood analysis failed: {message}"));
                self.error = Some(message);
            }
            AppEvent::SpotEditReady {
                data_url,
                prompt,
                spot,
            } => {
                let thumbnail = self.record_thumbnail(&data_url);
                self.studio
                    .record_spot_edit(data_url, thumbnail, &prompt, spot);
                self.is_generating = false;
                self.loading_message.clear();
                self.pending_spot = None;
                self.spot_prompt.clear();
                self.spot_mode = false;
                self.log_diagnostic("spot edit applied");
                self.persist();
                ctx.request_repaint();
            }
            AppEvent::SpotEditFailed(message) => {
                self.is_generating = false;
                self.loading_message.clear();
                self.log_diagnostic(format!("spot edit failed: {message}"));
                self.error = Some(message);
            }
        }
    }

    // ---- textures -------------------------------------------------------

    fn ensure_textures(&mut self, ctx: &egui::Context) {
        let studio = &self.studio;
        let textures = &mut self.textures;
        let thumbs = &mut self.thumb_textures;

        let live: Vec<Uuid> = studio.image_history.iter().map(|r| r.id).collect();
        textures.retain(|id, _| live.contains(id));
        thumbs.retain(|id, _| live.contains(id));

        // Full resolution only for the record on the canvas.
        if let Some(current) = &studio.current {
            if !textures.contains_key(&current.id) {
                match imaging::decode_data_url(&current.data_url) {
                    Ok(image) => {
                        let handle = ctx.load_texture(
                            format!("canvas-{}", current.id),
                            to_color_image(&image),
                            egui::TextureOptions::LINEAR,
                        );
                        textures.insert(current.id, handle);
                    }
                    Err(err) => log::warn!("canvas image did not decode: {err}"),
                }
            }
        }

        for record in &studio.image_history {
            if thumbs.contains_key(&record.id) {
                continue;
            }
            let source = record.thumbnail.as_deref().unwrap_or(&record.data_url);
            match imaging::decode_data_url(source) {
                Ok(image) => {
                    let handle = ctx.load_texture(
                        format!("thumb-{}", record.id),
                        to_color_image(&image),
                        egui::TextureOptions::LINEAR,
                    );
                    thumbs.insert(record.id, handle);
                }
                Err(err) => log::warn!("thumbnail did not decode: {err}"),
            }
        }
    }

    // ---- download -------------------------------------------------------

    fn download_current(&mut self, with_watermark: bool) {
        let Some(current) = self.studio.current.clone() else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JPEG image", &["jpg", "jpeg"])
            .set_file_name("homecanvas-design.jpg")
            .save_file()
        else {
            return;
        };

        let result = imaging::decode_data_url(&current.data_url).and_then(|image| {
            if with_watermark {
                watermark::stamp_jpeg(&image, 90)
            } else {
                imaging::encode_jpeg(&image, 90)
            }
        });
        match result {
            Ok(bytes) => {
                if let Err(err) = std::fs::write(&path, bytes) {
                    self.error = Some(format!("Failed to save image: {err}"));
                } else {
                    self.log_diagnostic(format!(
                        "design downloaded{} to {}",
                        if with_watermark { " (watermarked)" } else { "" },
                        path.display()
                    ));
                }
            }
            Err(err) => self.error = Some(err.to_string()),
        }
        self.show_download_modal = false;
    }

    // ---- panels ---------------------------------------------------------

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let (status_label, status_color) = self.status_label();
        let mut clear_requested = false;
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("HomeCanvas");
                ui.separator();
                ui.label(RichText::new(status_label).color(status_color));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .add_enabled(!self.studio.is_empty(), egui::Button::new("Clear All"))
                        .clicked()
                    {
                        clear_requested = true;
                    }
                });
            });
        });
        if clear_requested {
            self.clear_all();
        }
    }

    fn render_history_panel(&mut self, ctx: &egui::Context) {
        let mut selected: Option<Uuid> = None;
        let mut undo_requested = false;
        let mut reset_requested = false;
        let mut upload_requested = false;
        let mut example_clicked: Option<&str> = None;

        egui::SidePanel::left("history_panel")
            .resizable(true)
            .default_width(230.0)
            .show(ctx, |ui| {
                ui.heading("Design History");
                if ui.button("Open Room Photo...").clicked() {
                    upload_requested = true;
                }
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(self.studio.can_undo(), egui::Button::new("Undo"))
                        .clicked()
                    {
                        undo_requested = true;
                    }
                    if ui
                        .add_enabled(self.studio.can_reset(), egui::Button::new("Reset"))
                        .clicked()
                    {
                        reset_requested = true;
                    }
                });
                ui.separator();

                if self.studio.image_history.is_empty() {
                    ui.label(
                        RichText::new("Upload a room photo to start designing")
                            .color(self.theme.text_muted),
                    );
                }

                let current_id = self.studio.current.as_ref().map(|c| c.id);
                ScrollArea::vertical()
                    .id_salt("history_strip")
                    .show(ui, |ui| {
                        for record in &self.studio.image_history {
                            let caption = record
                                .caption
                                .clone()
                                .unwrap_or_else(|| "Original".to_string());
                            let response = match self.thumb_textures.get(&record.id) {
                                Some(texture) => ui.add(
                                    egui::Image::new(texture)
                                        .fit_to_exact_size(Vec2::splat(
                                            self.theme.thumbnail_edge,
                                        ))
                                        .sense(egui::Sense::click()),
                                ),
                                None => ui.button(&caption),
                            };
                            if response.clicked() {
                                selected = Some(record.id);
                            }
                            if current_id == Some(record.id) {
                                ui.painter().rect_stroke(
                                    response.rect.expand(2.0),
                                    egui::CornerRadius::same(4),
                                    egui::Stroke::new(2.0, self.theme.selection_ring),
                                    egui::StrokeKind::Outside,
                                );
                            }
                            ui.label(
                                RichText::new(caption)
                                    .small()
                                    .color(self.theme.text_muted),
                            );
                            ui.add_space(self.theme.spacing_8);
                        }
                    });

                ui.separator();
                ui.strong("Try one of these");
                for prompt in EXAMPLE_PROMPTS {
                    if ui
                        .add(
                            egui::Button::new(RichText::new(prompt).small())
                                .stroke(self.theme.subtle_button_stroke())
                                .wrap(),
                        )
                        .clicked()
                    {
                        example_clicked = Some(prompt);
                    }
                }
            });

        if upload_requested {
            self.open_upload_dialog();
        }
        if let Some(id) = selected {
            self.studio.select(id);
            self.error = None;
            self.persist();
        }
        if undo_requested {
            self.studio.undo();
            self.error = None;
            self.persist();
        }
        if reset_requested {
            self.studio.reset_to_original();
            self.error = None;
            self.persist();
        }
        if let Some(prompt) = example_clicked {
            self.prompt_buffer = prompt.to_string();
        }
    }

    fn render_advisor_panel(&mut self, ctx: &egui::Context) {
        let mut send_chat = false;
        let mut apply_prompt: Option<String> = None;
        let mut analyze_requested = false;

        egui::SidePanel::right("advisor_panel")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.heading("Design Advisor");
                let transcript_height = (ui.available_height() * 0.4).max(120.0);
                ScrollArea::vertical()
                    .id_salt("chat_transcript")
                    .max_height(transcript_height)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for message in &self.chat_transcript {
                            let label = match message.role {
                                ChatRole::User => format!("[You] {}", message.content),
                                ChatRole::Designer => {
                                    format!("[Designer] {}", message.content)
                                }
                            };
                            ui.label(label);
                            if message.role == ChatRole::Designer {
                                if let Some(prompt) = extract_prompt_section(&message.content)
                                {
                                    if ui
                                        .small_button("Use this prompt")
                                        .clicked()
                                    {
                                        apply_prompt = Some(prompt);
                                    }
                                }
                            }
                        }
                        if self.chat_waiting {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label(
                                    RichText::new("Thinking...")
                                        .color(self.theme.text_muted),
                                );
                            });
                        }
                        if self.scroll_chat_to_bottom {
                            ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                        }
                    });
                self.scroll_chat_to_bottom = false;

                let chat_enabled =
                    self.api_status == ApiStatus::Ready && !self.chat_waiting;
                let hint = if self.api_status != ApiStatus::Ready {
                    "API key missing"
                } else if self.chat_waiting {
                    "Waiting for reply..."
                } else {
                    "Ask for design advice..."
                };
                ui.horizontal(|ui| {
                    let response = ui.add_enabled(
                        chat_enabled,
                        egui::TextEdit::singleline(&mut self.chat_input)
                            .desired_width(f32::INFINITY)
                            .hint_text(hint),
                    );
                    if response.lost_focus()
                        && ui.input(|i| i.key_pressed(egui::Key::Enter))
                    {
                        send_chat = true;
                    }
                    send_chat |= ui
                        .add_enabled(
                            chat_enabled && !self.chat_input.trim().is_empty(),
                            egui::Button::new("Send"),
                        )
                        .clicked();
                });

                ui.separator();
                ui.heading("Mood Analyzer");
                let (mood, description) = MOOD_OPTIONS[self.selected_mood];
                egui::ComboBox::from_id_salt("mood_select")
                    .selected_text(mood)
                    .show_ui(ui, |ui| {
                        for (idx, (value, _)) in MOOD_OPTIONS.iter().enumerate() {
                            ui.selectable_value(&mut self.selected_mood, idx, *value);
                        }
                    });
                ui.label(RichText::new(description).small().color(self.theme.text_muted));
                let can_analyze = self.studio.current.is_some()
                    && self.api_status == ApiStatus::Ready
                    && !self.mood_waiting;
                if ui
                    .add_enabled(can_analyze, egui::Button::new("Analyze Room Mood"))
                    .clicked()
                {
                    analyze_requested = true;
                }
                if self.mood_waiting {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(
                            RichText::new("Analyzing mood...").color(self.theme.text_muted),
                        );
                    });
                }
                if let Some(report) = &self.mood_report {
                    self.theme.card_frame().show(ui, |ui| {
                        ScrollArea::vertical()
                            .id_salt("mood_report")
                            .max_height(180.0)
                            .show(ui, |ui| {
                                for (title, body) in [
                                    ("Current mood", &report.current_mood),
                                    ("Suggestions", &report.suggestions),
                                    ("Colors", &report.color_palette),
                                    ("Lighting", &report.lighting),
                                    ("Furniture", &report.furniture),
                                ] {
                                    if !body.is_empty() {
                                        ui.strong(title);
                                        ui.label(body);
                                    }
                                }
                                egui::CollapsingHeader::new("Full analysis")
                                    .default_open(false)
                                    .show(ui, |ui| {
                                        ui.label(&report.full_analysis);
                                    });
                            });
                    });
                }

                ui.separator();
                egui::CollapsingHeader::new("Diagnostics")
                    .default_open(false)
                    .show(ui, |ui| {
                        ScrollArea::vertical()
                            .id_salt("diagnostics_log")
                            .max_height(90.0)
                            .stick_to_bottom(true)
                            .show(ui, |ui| {
                                for entry in &self.diagnostics_log {
                                    ui.label(entry);
                                }
                            });
                    });
            });

        if send_chat {
            self.submit_chat(ctx);
        }
        if let Some(prompt) = apply_prompt {
            self.prompt_buffer = prompt;
        }
        if analyze_requested {
            self.submit_mood_analysis();
        }
    }

    fn render_canvas(&mut self, ctx: &egui::Context) {
        let mut spot_clicked: Option<SpotPoint> = None;
        let mut generate_requested = false;
        let mut spot_apply_requested = false;
        let mut dismiss_error = false;
        let mut open_download = false;

        let canvas_frame = egui::Frame::new()
            .fill(self.theme.surface_0)
            .inner_margin(egui::Margin::same(self.theme.spacing_12 as i8));
        egui::CentralPanel::default().frame(canvas_frame).show(ctx, |ui| {
            let Some(current) = self.studio.current.clone() else {
                ui.centered_and_justified(|ui| {
                    ui.label(
                        RichText::new(
                            "Drop a room photo here, or use Open Room Photo to begin",
                        )
                        .color(self.theme.text_muted),
                    );
                });
                return;
            };

            let composer_height = 130.0;
            let canvas_height = (ui.available_height() - composer_height).max(120.0);
            let avail = Vec2::new(ui.available_width(), canvas_height);

            if let Some(texture) = self.textures.get(&current.id) {
                let tex_size = texture.size_vec2();
                let scale = (avail.x / tex_size.x)
                    .min(avail.y / tex_size.y)
                    .min(1.0);
                let draw_size = tex_size * scale;

                let response = ui
                    .with_layout(
                        egui::Layout::top_down(egui::Align::Center),
                        |ui| {
                            ui.add(
                                egui::Image::new(texture)
                                    .fit_to_exact_size(draw_size)
                                    .sense(egui::Sense::click()),
                            )
                        },
                    )
                    .inner;

                if self.spot_mode {
                    if response.clicked() {
                        if let Some(pos) = response.interact_pointer_pos() {
                            let rect = response.rect;
                            let x = ((pos.x - rect.min.x) / rect.width() * 100.0)
                                .clamp(0.0, 100.0);
                            let y = ((pos.y - rect.min.y) / rect.height() * 100.0)
                                .clamp(0.0, 100.0);
                            spot_clicked = Some(SpotPoint { x, y });
                        }
                    }
                    if let Some(spot) = self.pending_spot {
                        let rect = response.rect;
                        let marker = egui::pos2(
                            rect.min.x + rect.width() * spot.x / 100.0,
                            rect.min.y + rect.height() * spot.y / 100.0,
                        );
                        ui.painter()
                            .circle_filled(marker, 6.0, self.theme.spot_marker);
                        ui.painter().circle_stroke(
                            marker,
                            9.0,
                            egui::Stroke::new(2.0, self.theme.selection_ring),
                        );
                    }
                }
            } else {
                let _ = ui.allocate_space(avail);
            }

            ui.add_space(self.theme.spacing_16);
            self.theme.composer_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    let toggle = ui.selectable_label(self.spot_mode, "Spot Edit");
                    if toggle.clicked() {
                        self.spot_mode = !self.spot_mode;
                        if !self.spot_mode {
                            self.pending_spot = None;
                        }
                    }
                    if ui.button("Download").clicked() {
                        open_download = true;
                    }
                    if self.is_generating {
                        ui.spinner();
                        ui.label(
                            RichText::new(&self.loading_message)
                                .color(self.theme.text_muted),
                        );
                    }
                });

                if self.spot_mode {
                    match self.pending_spot {
                        Some(spot) => {
                            ui.horizontal(|ui| {
                                ui.label(format!(
                                    "Spot ({:.1}%, {:.1}%):",
                                    spot.x, spot.y
                                ));
                                ui.add(
                                    egui::TextEdit::singleline(&mut self.spot_prompt)
                                        .desired_width(f32::INFINITY)
                                        .hint_text("What should change here?"),
                                );
                                let can_apply = !self.spot_prompt.trim().is_empty()
                                    && !self.is_generating
                                    && self.api_status == ApiStatus::Ready;
                                if ui
                                    .add_enabled(can_apply, egui::Button::new("Apply"))
                                    .clicked()
                                {
                                    spot_apply_requested = true;
                                }
                            });
                        }
                        None => {
                            ui.label(
                                RichText::new("Click a spot on the photo to anchor the edit")
                                    .color(self.theme.text_muted),
                            );
                        }
                    }
                }

                let composer_enabled =
                    self.api_status == ApiStatus::Ready && !self.is_generating;
                let hint = if self.api_status != ApiStatus::Ready {
                    "Set GEMINI_API_KEY to enable generation"
                } else if self.is_generating {
                    "Generating..."
                } else {
                    "Describe the change, e.g. \"change the wall color to sage green\""
                };
                ui.horizontal(|ui| {
                    let response = ui.add_enabled(
                        composer_enabled,
                        egui::TextEdit::singleline(&mut self.prompt_buffer)
                            .desired_width(ui.available_width() - 110.0)
                            .hint_text(hint),
                    );
                    if response.lost_focus()
                        && ui.input(|i| i.key_pressed(egui::Key::Enter))
                    {
                        generate_requested = true;
                    }
                    generate_requested |= ui
                        .add_enabled(
                            composer_enabled && !self.prompt_buffer.trim().is_empty(),
                            egui::Button::new("Generate"),
                        )
                        .clicked();
                });

                if let Some(error) = &self.error {
                    ui.horizontal(|ui| {
                        ui.label(RichText::new(error).color(self.theme.danger));
                        if ui.small_button("Dismiss").clicked() {
                            dismiss_error = true;
                        }
                    });
                }
            });
        });

        if let Some(spot) = spot_clicked {
            self.pending_spot = Some(spot);
        }
        if generate_requested {
            self.submit_design_prompt();
        }
        if spot_apply_requested {
            self.submit_spot_edit();
        }
        if dismiss_error {
            self.error = None;
        }
        if open_download {
            self.show_download_modal = true;
        }
    }

    fn render_download_modal(&mut self, ctx: &egui::Context) {
        if !self.show_download_modal {
            return;
        }
        let mut choice: Option<bool> = None;
        let mut close = false;
        egui::Window::new("Download Design")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Free downloads carry a small HomeCanvas mark.");
                ui.label(
                    RichText::new("Premium: high quality, no watermark")
                        .small()
                        .color(self.theme.text_muted),
                );
                ui.horizontal(|ui| {
                    if ui.button("Download free").clicked() {
                        choice = Some(true);
                    }
                    if ui.button("Download premium").clicked() {
                        choice = Some(false);
                    }
                    if ui.button("Cancel").clicked() {
                        close = true;
                    }
                });
            });
        if let Some(with_watermark) = choice {
            self.download_current(with_watermark);
        }
        if close {
            self.show_download_modal = false;
        }
    }
}

impl eframe::App for HomeCanvasApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.handle_dropped_files(ctx);
        self.ensure_textures(ctx);
        self.render_top_bar(ctx);
        self.render_history_panel(ctx);
        self.render_advisor_panel(ctx);
        self.render_canvas(ctx);
        self.render_download_modal(ctx);

        // Worker completions arrive on a plain channel; keep frames coming
        // while any request is in flight so they get drained promptly.
        if self.is_generating || self.chat_waiting || self.mood_waiting {
            ctx.request_repaint_after(Duration::from_millis(200));
        }
    }
}

fn to_color_image(image: &DynamicImage) -> egui::ColorImage {
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw())
}
