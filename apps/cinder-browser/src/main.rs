use cn_core::CancelToken;
use cn_core::Rect;
use cn_dom::Document;
use cn_dom::Element;
use cn_engine::CaptionSink;
use cn_engine::DomEngine;
use cn_engine::EngineConfig;
use cn_engine::LineCursorMeasure;
use cn_engine::ParseOutcome;
use cn_engine::TagPolicy;
use cn_engine::remove_units;
use cn_inspector::InspectorConfig;
use cn_inspector::InspectorView;
use cn_ipc::ChannelConfig;
use cn_ipc::EndpointRole;
use cn_ipc::EngineEndpoint;
use cn_ipc::InspectorEndpoint;
use cn_ipc::PatchRequest;
use cn_ipc::inspector_channel_pair;
use eframe::egui;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const VIEWPORT_WIDTH: u32 = 1280;
const VIEWPORT_HEIGHT: u32 = 720;
const INSPECTOR_PANEL_WIDTH: f32 = 320.0;
const PARSE_THREAD_STACK_SIZE: usize = 8 * 1024 * 1024;
const TEXTBOX_WIDGET_WIDTH: f32 = 180.0;
const TEXTBOX_WIDGET_HEIGHT: f32 = 24.0;

const SAMPLE_DOCUMENT: &str = "<html>\n<head><title>Cinder Sample</title></head>\n<body>\n<h1>Welcome to Cinder</h1>\n<p>This page mixes <b>bold</b>, <i>italic</i> and <u>underlined</u> runs.</p>\n<p style=\"color: teal; font-size: 20px\">A styled paragraph.<br>With a manual line break.</p>\n<input name=\"query\" width=\"50%\">\n</body>\n</html>\n";

/// Caption slot shared with the parse worker; the UI thread applies it as
/// the window title.
#[derive(Debug, Clone, Default)]
struct SharedCaption(Arc<Mutex<Option<String>>>);

impl CaptionSink for SharedCaption {
    fn set_caption(&mut self, title: &str) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(title.to_owned());
        }
    }
}

struct ParseResult {
    request_id: u64,
    // Ok(None) means the parse was cancelled and produced no document.
    result: Result<Option<Document>, String>,
}

struct CinderApp {
    html_input: String,
    document: Option<Document>,
    status_line: String,
    last_error: Option<String>,
    next_request_id: u64,
    inflight: Option<(u64, CancelToken)>,
    parse_receiver: Option<mpsc::Receiver<ParseResult>>,
    pending_caption: Arc<Mutex<Option<String>>>,
    show_overlays: bool,
    show_inspector: bool,
    policy: TagPolicy,
    form_state: HashMap<usize, String>,
    inspector: InspectorView,
    engine_endpoint: Option<EngineEndpoint>,
    inspector_endpoint: Option<InspectorEndpoint>,
    // Reserved inspector-to-engine lane; held so the channel stays open.
    _patch_receiver: Option<mpsc::Receiver<PatchRequest>>,
    channel_error: Option<String>,
}

impl Default for CinderApp {
    fn default() -> Self {
        let inspector_view = InspectorView::new(InspectorConfig::default())
            .unwrap_or_else(|_| {
                // Default config is statically valid; rebuild with a 1x1 view
                // is unreachable.
                unreachable!()
            });

        let (engine_endpoint, inspector_endpoint, patch_receiver, channel_error) =
            match build_channels() {
                Ok((engine, inspector, patch_rx)) => {
                    (Some(engine), Some(inspector), Some(patch_rx), None)
                }
                Err(error) => (None, None, None, Some(error)),
            };

        Self {
            html_input: SAMPLE_DOCUMENT.to_owned(),
            document: None,
            status_line: "Ready".to_owned(),
            last_error: None,
            next_request_id: 1,
            inflight: None,
            parse_receiver: None,
            pending_caption: Arc::new(Mutex::new(None)),
            show_overlays: false,
            show_inspector: true,
            policy: TagPolicy::default(),
            form_state: HashMap::new(),
            inspector: inspector_view,
            engine_endpoint,
            inspector_endpoint,
            _patch_receiver: patch_receiver,
            channel_error,
        }
    }
}

fn build_channels() -> Result<
    (
        EngineEndpoint,
        InspectorEndpoint,
        mpsc::Receiver<PatchRequest>,
    ),
    String,
> {
    let engine = ChannelConfig::hardened(EndpointRole::Engine).map_err(|error| error.to_string())?;
    let inspector =
        ChannelConfig::hardened(EndpointRole::Inspector).map_err(|error| error.to_string())?;
    inspector_channel_pair(engine, inspector).map_err(|error| error.to_string())
}

impl CinderApp {
    fn is_loading(&self) -> bool {
        self.inflight.is_some()
    }

    fn start_parse(&mut self) {
        if let Some((_, token)) = self.inflight.take() {
            token.cancel();
        }

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.saturating_add(1);
        let cancel = CancelToken::new();
        self.inflight = Some((request_id, cancel.clone()));
        self.status_line = "Parsing...".to_owned();
        self.last_error = None;

        let html = self.html_input.clone();
        let caption = SharedCaption(Arc::clone(&self.pending_caption));
        let overlays = self.show_overlays;
        let (tx, rx) = mpsc::channel();
        self.parse_receiver = Some(rx);

        let parse_job = move || {
            let result = run_parse(&html, overlays, caption, &cancel);
            let _ = tx.send(ParseResult { request_id, result });
        };

        if thread::Builder::new()
            .name("cinder-parse".to_owned())
            .stack_size(PARSE_THREAD_STACK_SIZE)
            .spawn(parse_job)
            .is_err()
        {
            self.inflight = None;
            self.parse_receiver = None;
            self.status_line = "Parse failed".to_owned();
            self.last_error = Some("failed to spawn parse worker".to_owned());
        }
    }

    fn stop_parse(&mut self) {
        if let Some((_, token)) = self.inflight.take() {
            token.cancel();
            self.status_line = "Stopped".to_owned();
        }
    }

    fn poll_parse(&mut self) {
        loop {
            let message = self
                .parse_receiver
                .as_ref()
                .and_then(|receiver| receiver.try_recv().ok());

            let Some(message) = message else {
                break;
            };

            let inflight_id = self.inflight.as_ref().map(|(id, _)| *id);
            if Some(message.request_id) != inflight_id {
                continue;
            }

            self.inflight = None;
            self.parse_receiver = None;

            match message.result {
                Ok(Some(document)) => {
                    self.status_line = format!(
                        "Parsed {} nodes",
                        document.html_element.node_count()
                    );
                    self.form_state.clear();
                    self.publish_to_inspector(&document);
                    self.document = Some(document);
                    self.last_error = None;
                }
                Ok(None) => {
                    self.status_line = "Stopped".to_owned();
                }
                Err(error) => {
                    self.status_line = "Parse failed".to_owned();
                    self.last_error = Some(error);
                }
            }
        }
    }

    fn publish_to_inspector(&mut self, document: &Document) {
        let Some(endpoint) = &self.engine_endpoint else {
            return;
        };

        if let Err(error) = endpoint.publish_tree(document.html_element.clone()) {
            self.channel_error = Some(error.to_string());
        }
    }

    fn apply_pending_caption(&mut self, ctx: &egui::Context) {
        let title = self
            .pending_caption
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(title) = title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));
        }
    }

    fn render_page(&mut self, ui: &mut egui::Ui) {
        let Self {
            document,
            policy,
            form_state,
            show_overlays,
            ..
        } = self;

        let Some(document) = document.as_ref() else {
            ui.label("No document parsed yet. Edit the markup and press Parse.");
            return;
        };

        egui::ScrollArea::both()
            .id_salt("page_scroll")
            .show(ui, |ui| {
                let desired = egui::vec2(VIEWPORT_WIDTH as f32, VIEWPORT_HEIGHT as f32);
                let (response, painter) = ui.allocate_painter(desired, egui::Sense::hover());
                let origin = response.rect.min;

                let mut paint = PagePaint {
                    overlays: *show_overlays,
                    policy,
                    form_state,
                    widget_slot: 0,
                };
                paint_element(ui, &painter, origin, &document.html_element, &mut paint);
            });
    }

    fn render_inspector(&mut self, ui: &mut egui::Ui) {
        ui.heading("Inspector");
        if let Some(error) = &self.channel_error {
            ui.colored_label(egui::Color32::from_rgb(200, 65, 65), error);
        }

        let config = self.inspector.config();
        let desired = egui::vec2(config.view_width as f32, config.view_height as f32);
        let (response, painter) = ui.allocate_painter(desired, egui::Sense::click());
        let origin = response.rect.min;

        if response.hovered() {
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            if scroll != 0.0 {
                self.inspector.scroll_by(-scroll as i32);
            }
        }

        let pointer = response.hover_pos().map(|pos| {
            (
                (pos.x - origin.x) as i32,
                (pos.y - origin.y) as i32,
            )
        });
        let hovered = pointer.and_then(|(x, y)| self.inspector.hover(x, y));
        if response.clicked() {
            if let Some((x, y)) = pointer {
                self.inspector.click(x, y);
            }
        }

        let scroll = self.inspector.scroll();
        for (index, row) in self.inspector.rows().iter().enumerate() {
            let rect = egui::Rect::from_min_size(
                egui::pos2(
                    origin.x + row.rect.x as f32,
                    origin.y + (row.rect.y - scroll) as f32,
                ),
                egui::vec2(row.rect.width as f32, row.rect.height as f32),
            );
            if !response.rect.intersects(rect) {
                continue;
            }

            if row.selected {
                painter.rect_filled(
                    rect,
                    egui::CornerRadius::same(2),
                    egui::Color32::from_rgb(60, 90, 130),
                );
            } else if hovered == Some(index) {
                painter.rect_filled(rect, egui::CornerRadius::same(2), egui::Color32::from_gray(60));
            }
            painter.text(
                rect.left_center(),
                egui::Align2::LEFT_CENTER,
                &row.label,
                egui::FontId::monospace(13.0),
                egui::Color32::from_gray(220),
            );
        }

        ui.separator();
        self.render_selected_detail(ui);
    }

    fn render_selected_detail(&self, ui: &mut egui::Ui) {
        let selected_index = self
            .inspector
            .rows()
            .iter()
            .position(|row| row.selected);
        let element = selected_index.and_then(|index| {
            self.document
                .as_ref()
                .and_then(|document| nth_in_document_order(&document.html_element, index))
        });

        let Some(element) = element else {
            ui.label("Click a row to inspect it.");
            return;
        };

        ui.monospace(format!("<{}>", element.tag));
        ui.label(format!(
            "rect: {}x{} at ({}, {})",
            element.rect.width, element.rect.height, element.rect.x, element.rect.y
        ));
        ui.label(format!(
            "font: {}px (parent {}px)",
            element.styles.text_tag_size, element.styles.parent_tag_size
        ));
        for (name, value) in &element.attributes {
            if name == "html" {
                continue;
            }
            ui.label(format!("{name} = {value}"));
        }
    }
}

impl eframe::App for CinderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_parse();
        self.apply_pending_caption(ctx);
        if let Some(endpoint) = &self.inspector_endpoint {
            self.inspector.poll(endpoint);
        }
        if ctx.input(|input| input.key_pressed(egui::Key::F12)) {
            self.show_inspector = !self.show_inspector;
        }
        if self.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        egui::TopBottomPanel::top("toolbar_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Parse").clicked() {
                    self.start_parse();
                }
                if ui
                    .add_enabled(self.is_loading(), egui::Button::new("Stop"))
                    .clicked()
                {
                    self.stop_parse();
                }

                ui.separator();
                ui.checkbox(&mut self.show_overlays, "Text overlays");
                ui.checkbox(&mut self.show_inspector, "Inspector (F12)");

                if self.is_loading() {
                    ui.separator();
                    ui.spinner();
                    ui.label("Parsing");
                }
            });
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.label(&self.status_line);
                if let Some(error) = &self.last_error {
                    ui.colored_label(
                        egui::Color32::from_rgb(200, 65, 65),
                        format!("Error: {error}"),
                    );
                }
            });
        });

        if self.show_inspector {
            egui::SidePanel::right("inspector_panel")
                .default_width(INSPECTOR_PANEL_WIDTH)
                .show(ctx, |ui| {
                    self.render_inspector(ui);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                columns[0].heading("Markup");
                egui::ScrollArea::vertical()
                    .id_salt("markup_scroll")
                    .show(&mut columns[0], |ui| {
                        ui.add(
                            egui::TextEdit::multiline(&mut self.html_input)
                                .code_editor()
                                .desired_width(f32::INFINITY)
                                .desired_rows(24),
                        );
                    });

                columns[1].heading("Page");
                self.render_page(&mut columns[1]);
            });
        });
    }
}

fn run_parse(
    html: &str,
    overlays: bool,
    caption: SharedCaption,
    cancel: &CancelToken,
) -> Result<Option<Document>, String> {
    let config = EngineConfig {
        viewport_width: VIEWPORT_WIDTH,
        viewport_height: VIEWPORT_HEIGHT,
        show_measured_overlays: overlays,
    };
    let measure = LineCursorMeasure::new(config.viewport_width);
    let mut engine = DomEngine::new(
        config,
        TagPolicy::default(),
        Box::new(measure),
        Box::new(caption),
    )
    .map_err(|error| error.to_string())?;

    let outcome = engine.parse(html, cancel).map_err(|error| error.to_string())?;
    match outcome {
        ParseOutcome::Finished(document) => Ok(Some(document)),
        ParseOutcome::Cancelled => Ok(None),
    }
}

struct PagePaint<'a> {
    overlays: bool,
    policy: &'a TagPolicy,
    form_state: &'a mut HashMap<usize, String>,
    widget_slot: usize,
}

fn paint_element(
    ui: &mut egui::Ui,
    painter: &egui::Painter,
    origin: egui::Pos2,
    element: &Element,
    paint: &mut PagePaint<'_>,
) {
    if element.is_text() {
        let rect = to_egui_rect(origin, element.rect);
        if paint.overlays {
            painter.rect_filled(
                rect,
                egui::CornerRadius::ZERO,
                egui::Color32::from_rgba_unmultiplied(120, 170, 220, 40),
            );
        }
        painter.text(
            rect.min,
            egui::Align2::LEFT_TOP,
            element.text_content(),
            egui::FontId::proportional(resolved_font_px(element)),
            text_color(element),
        );
    } else if paint.policy.is_textbox_tag(&element.tag) {
        let slot = paint.widget_slot;
        paint.widget_slot = paint.widget_slot.saturating_add(1);
        let value = paint.form_state.entry(slot).or_default();

        let width = if element.width > 0 {
            element.width as f32
        } else {
            TEXTBOX_WIDGET_WIDTH
        };
        let rect = egui::Rect::from_min_size(
            egui::pos2(
                origin.x + element.rect.x as f32,
                origin.y + element.rect.y as f32,
            ),
            egui::vec2(width, TEXTBOX_WIDGET_HEIGHT),
        );
        ui.put(rect, egui::TextEdit::singleline(value));
    }

    for child in &element.children {
        paint_element(ui, painter, origin, child, paint);
    }
}

fn to_egui_rect(origin: egui::Pos2, rect: Rect) -> egui::Rect {
    egui::Rect::from_min_size(
        egui::pos2(origin.x + rect.x as f32, origin.y + rect.y as f32),
        egui::vec2(rect.width as f32, rect.height as f32),
    )
}

/// Pixel size for a text element: an inline `font-size` wins, clamped the
/// same way the engine resolves it, otherwise the tag-kind default.
fn resolved_font_px(element: &Element) -> f32 {
    let styles = &element.styles;
    match styles.font_size.as_deref() {
        Some(raw) => remove_units(
            raw,
            styles.text_tag_size as i32,
            1,
            styles.parent_tag_size as i32,
        ) as f32,
        None => styles.text_tag_size as f32,
    }
}

fn text_color(element: &Element) -> egui::Color32 {
    let named = element
        .styles
        .extra
        .get("color")
        .and_then(cn_dom::StyleValue::as_text);
    match named {
        Some("red") => egui::Color32::from_rgb(200, 65, 65),
        Some("green") => egui::Color32::from_rgb(80, 160, 80),
        Some("blue") => egui::Color32::from_rgb(90, 120, 210),
        Some("teal") => egui::Color32::from_rgb(60, 150, 150),
        _ => egui::Color32::from_gray(220),
    }
}

/// Nth node of the tree in the inspector's depth-first document order.
fn nth_in_document_order(root: &Element, index: usize) -> Option<&Element> {
    let mut remaining = index;
    let mut stack = vec![root];
    while let Some(element) = stack.pop() {
        if remaining == 0 {
            return Some(element);
        }
        remaining = remaining.saturating_sub(1);
        for child in element.children.iter().rev() {
            stack.push(child);
        }
    }
    None
}

fn main() -> Result<(), eframe::Error> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Cinder Browser")
            .with_inner_size([1320.0, 840.0])
            .with_min_inner_size([960.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Cinder Browser",
        native_options,
        Box::new(|_cc| Ok(Box::new(CinderApp::default()))),
    )
}
