use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::columns::{COLUMNS, ColumnDef, ColumnId, column};
use crate::debounce::Debouncer;
use crate::domain::{BoardConfig, BoardError, CMDMode, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::strategy::EnrichedRow;
use crate::table::{SortDirection, TableViewModel};
use crate::ui::{CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT};

pub const FILTER_PLACEHOLDER: &str = "Search...";

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub name: String,
    /// Text of the filter row, `None` for columns that can not be filtered.
    pub filter: Option<String>,
    pub width: usize,
    pub data: Vec<String>,
}

impl ColumnView {
    fn empty() -> Self {
        ColumnView {
            name: String::new(),
            filter: None,
            width: 0,
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

struct TableView {
    rows: Arc<Vec<usize>>, // Projection of the view model, indices into its rows
    visible_columns: Vec<ColumnId>, // Columns that fit on screen, starting at offset_column
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    data: Vec<ColumnView>,
    heigh: usize,
    width: usize,
}

impl TableView {
    fn empty() -> Self {
        TableView {
            rows: Arc::new(Vec::new()),
            visible_columns: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            data: Vec::new(),
            heigh: 0,
            width: 0,
        }
    }

    fn abs_row(&self) -> usize {
        self.offset_row + self.curser_row
    }

    // Keeps cursor and offset inside the projection after it shrank.
    fn clamp_rows(&mut self) {
        let nrows = self.rows.len();
        if nrows == 0 {
            self.offset_row = 0;
            self.curser_row = 0;
            return;
        }
        if self.abs_row() >= nrows {
            let last = nrows - 1;
            self.offset_row = std::cmp::min(self.offset_row, last);
            self.curser_row = last - self.offset_row;
        }
        let height = self.heigh.max(1);
        if self.curser_row >= height {
            self.offset_row += self.curser_row + 1 - height;
            self.curser_row = height - 1;
        }
    }
}

struct RecordView {
    header_data: Vec<String>,
    header_width: usize,
    header_view: ColumnView,
    row_data: Vec<String>,
    row_view: ColumnView,
    record_idx: usize, // Index in TableView.rows[XXX]
    curser_row: usize,
    curser_offset: usize,
    height: usize,
    width: usize,
}

impl RecordView {
    fn empty() -> Self {
        RecordView {
            header_data: Vec::new(),
            header_width: 0,
            header_view: ColumnView::empty(),
            row_data: Vec::new(),
            row_view: ColumnView::empty(),
            record_idx: 0,
            curser_row: 0,
            curser_offset: 0,
            height: 0,
            width: 0,
        }
    }
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub show_filters: bool,
    pub nrows: usize, // Total number of rows in this view
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub cmd_prompt: String,
    pub active_cmdinput: bool,
    pub global_filter: String,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            show_filters: false,
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            cmd_prompt: String::new(),
            active_cmdinput: false,
            global_filter: String::new(),
            status_message: String::new(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGH + TABLE_HEADER_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: BoardConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    view: TableViewModel,
    column_widths: Vec<usize>, // Natural width of each entry in COLUMNS
    table: TableView,
    record_view: RecordView,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    cmd_original: String,
    last_input: InputResult,
    active_cmdinput: bool,
    debouncer: Debouncer<(CMDMode, String)>,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &BoardConfig,
        rows: Vec<EnrichedRow>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let column_widths = Self::natural_widths(&rows);
        let clipboard = Clipboard::new()
            .map_err(|e| error!("Clipboard not available: {e}"))
            .ok();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            view: TableViewModel::new(rows, config.sort_follows_filter),
            column_widths,
            table: TableView::empty(),
            record_view: RecordView::empty(),
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard,
            input: Inputter::default(),
            cmd_mode: None,
            cmd_original: String::new(),
            last_input: InputResult::default(),
            active_cmdinput: false,
            debouncer: Debouncer::new(config.debounce),
            status_message: String::new(),
        };
        model.recalculate_rows();
        model.set_status_message(format!("Loaded {} strategy rows", model.view.rows().len()));
        model
    }

    fn natural_widths(rows: &[EnrichedRow]) -> Vec<usize> {
        COLUMNS
            .iter()
            .map(|def| {
                // Room for the sort indicator and the filter placeholder
                let mut header = def.header.chars().count() + 2;
                if def.can_filter() {
                    header = std::cmp::max(header, FILTER_PLACEHOLDER.chars().count());
                }
                rows.iter()
                    .map(|r| def.id.format(r).chars().count())
                    .fold(header, std::cmp::max)
            })
            .collect()
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    fn current_column(&self) -> Option<ColumnId> {
        self.table
            .visible_columns
            .get(self.table.curser_column)
            .copied()
    }

    fn current_row(&self) -> Option<&EnrichedRow> {
        self.table
            .rows
            .get(self.table.abs_row())
            .map(|&idx| &self.view.rows()[idx])
    }

    /// Recomputes the projection after filters or sorting changed.
    fn recalculate_rows(&mut self) {
        let start_time = Instant::now();
        let rows: Vec<usize> = self
            .view
            .projection()
            .into_iter()
            .map(|p| p.index)
            .collect();
        debug!(
            "Projection has {} of {} rows, took {}ms",
            rows.len(),
            self.view.rows().len(),
            start_time.elapsed().as_millis()
        );
        self.table.rows = Arc::new(rows);
        self.update_table_data();
    }

    fn render_width(&self, def: &ColumnDef) -> usize {
        let natural = self.column_widths[def.id as usize] + COLUMN_WIDTH_MARGIN;
        let cap = def.max_width.unwrap_or(self.config.max_column_width);
        std::cmp::min(natural, cap)
    }

    fn header_name(&self, def: &ColumnDef, width: usize) -> String {
        let indicator = match self.view.sort_direction(def.id) {
            Some(SortDirection::Ascending) => " ▲",
            Some(SortDirection::Descending) => " ▼",
            None => "",
        };
        let name = Self::get_visible_name(def.header, width.saturating_sub(indicator.chars().count()));
        format!("{name}{indicator}")
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if name.chars().count() <= width {
            return name.to_string();
        }
        if width < 3 {
            return name.chars().take(width).collect();
        }
        let mut reduced: String = name.chars().take(width - 3).collect();
        reduced.push_str("...");
        reduced
    }

    fn update_table_data(&mut self) {
        let columns = self.view.visible_columns();
        self.table.width = self.uilayout.table_width;
        self.table.heigh = self.uilayout.table_height;
        self.table.offset_column = std::cmp::min(
            self.table.offset_column,
            columns.len().saturating_sub(1),
        );
        self.table.clamp_rows();

        let rbegin = self.table.offset_row;
        let rend = std::cmp::min(rbegin + self.table.heigh, self.table.rows.len());

        trace!(
            "Table: Cr {}, Cc {}, Or {}, Oc {}, Rb {}, Re {}, tw: {}, th:{}",
            self.table.curser_row,
            self.table.curser_column,
            self.table.offset_row,
            self.table.offset_column,
            rbegin,
            rend,
            self.table.width,
            self.table.heigh,
        );

        // Create a list of columns that fit in the table
        let mut visible: Vec<(&ColumnDef, usize)> = Vec::new();
        let mut visible_width = 0;
        for &def in columns.iter().skip(self.table.offset_column) {
            let width = self.render_width(def);
            if visible_width + width + 1 <= self.table.width {
                visible.push((def, width));
                visible_width += width + 1;
            } else {
                // Add the last partial visible column
                if visible_width < self.table.width {
                    visible.push((def, self.table.width - visible_width));
                }
                break;
            }
        }

        let data: Vec<ColumnView> = visible
            .iter()
            .map(|&(def, width)| {
                let filter = def.can_filter().then(|| {
                    self.view
                        .column_filter(def.id)
                        .unwrap_or(FILTER_PLACEHOLDER)
                        .to_string()
                });
                let rows = self.view.rows();
                ColumnView {
                    name: self.header_name(def, width),
                    filter,
                    width,
                    data: self.table.rows[rbegin..rend]
                        .iter()
                        .map(|&ridx| def.id.format(&rows[ridx]))
                        .collect(),
                }
            })
            .collect();

        self.table.visible_columns = visible.iter().map(|(def, _)| def.id).collect();
        self.table.data = data;
        // Growing columns can reduce the number of visible columns
        self.table.curser_column = std::cmp::min(
            self.table.curser_column,
            self.table.visible_columns.len().saturating_sub(1),
        );
        self.update_uidata_for_table();
    }

    fn update_uidata_for_table(&mut self) {
        let table = &self.table;
        self.uidata = UIData {
            name: "Strategy".to_string(),
            table: table.data.clone(),
            show_filters: true,
            nrows: table.rows.len(),
            selected_row: table.curser_row,
            selected_column: table.curser_column,
            abs_selected_row: table.abs_row(),
            show_popup: false,
            popup_message: String::new(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_prompt: self.cmd_prompt(),
            active_cmdinput: self.active_cmdinput,
            global_filter: self.view.global_filter().to_string(),
            status_message: self.status_message.clone(),
        }
    }

    fn cmd_prompt(&self) -> String {
        match self.cmd_mode {
            Some(CMDMode::Search) => "/".to_string(),
            Some(CMDMode::FilterColumn(id)) => format!("{} filter: ", column(id).header),
            None => String::new(),
        }
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        match self.modus {
            Modus::RECORD => self.update_record_data(),
            Modus::POPUP => self.uidata.layout = self.uilayout.clone(),
            Modus::TABLE | Modus::CMDINPUT => self.update_table_data(),
        }
    }

    /// Applies a debounced input once it settled.
    pub fn tick(&mut self, now: Instant) {
        if let Some((mode, text)) = self.debouncer.poll(now) {
            debug!("Debounced input {:?} settled: {:?}", mode, text);
            self.apply_input(mode, &text);
        }
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), BoardError> {
        self.tick(Instant::now());

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageUp => self.move_table_selection_up(self.table.heigh.max(1)),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.table.heigh.max(1))
                    }
                    Message::MoveBeginning => self.move_table_selection_beginning(),
                    Message::MoveEnd => self.move_table_selection_end(),
                    Message::ToggleSort => self.toggle_sort(),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::Filter => self.start_column_filter(),
                    Message::HideColumn => self.hide_current_column(),
                    Message::ShowAllColumns => self.show_all_columns(),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Help => self.show_help(),
                    Message::Enter => self.enter(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_record_selection_down(1),
                    Message::MoveUp => self.move_record_selection_up(1),
                    Message::MoveLeft => self.previous_record(),
                    Message::MoveRight => self.next_record(),
                    Message::MovePageUp => self.move_record_selection_up(10),
                    Message::MovePageDown => self.move_record_selection_down(10),
                    Message::CopyCell => self.copy_record_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Help => self.show_help(),
                    Message::Exit => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter | Message::Help => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        if self.table.rows.is_empty() {
            return;
        }
        let record_idx = self.table.abs_row();
        self.build_record_view(record_idx);
        self.previous_modus = Modus::TABLE;
        self.modus = Modus::RECORD;
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::RECORD => {
                // Follow the record that was browsed last
                let record_idx = self.record_view.record_idx;
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
                self.select_row(record_idx);
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
            }
            Modus::TABLE | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    fn toggle_sort(&mut self) {
        let Some(column_id) = self.current_column() else {
            return;
        };
        self.view.toggle_sort(column_id);
        let header = column(column_id).header;
        let message = match self.view.sort_direction(column_id) {
            Some(SortDirection::Ascending) => format!("Sorted by {header} ascending"),
            Some(SortDirection::Descending) => format!("Sorted by {header} descending"),
            None => "Sorting removed".to_string(),
        };
        self.set_status_message(message);
        self.recalculate_rows();
    }

    fn hide_current_column(&mut self) {
        let Some(column_id) = self.current_column() else {
            return;
        };
        if self.view.visible_columns().len() <= 1 {
            self.set_status_message("Can not hide the last column!");
            return;
        }
        self.view.set_column_visibility(column_id, false);
        self.set_status_message(format!(
            "Hid column {} (X shows all)",
            column(column_id).header
        ));
        self.update_table_data();
    }

    fn show_all_columns(&mut self) {
        self.view.show_all_columns();
        self.set_status_message("Showing all columns");
        self.update_table_data();
    }

    fn start_column_filter(&mut self) {
        match self.current_column() {
            Some(column_id) if column(column_id).can_filter() => {
                self.enter_cmd_mode(CMDMode::FilterColumn(column_id))
            }
            Some(column_id) => self.set_status_message(format!(
                "Column {} can not be filtered",
                column(column_id).header
            )),
            None => {}
        }
    }

    fn input_value(&self, mode: CMDMode) -> String {
        match mode {
            CMDMode::Search => self.view.global_filter().to_string(),
            CMDMode::FilterColumn(column_id) => self
                .view
                .column_filter(column_id)
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.cmd_original = self.input_value(mode);

        self.active_cmdinput = true;
        self.input.set(&self.cmd_original);
        self.last_input = self.input.get();

        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.cmd_prompt = self.cmd_prompt();
        self.uidata.active_cmdinput = self.active_cmdinput;
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        let previous = std::mem::take(&mut self.last_input.input);
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        } else if self.last_input.input != previous
            && let Some(mode) = self.cmd_mode
        {
            self.debouncer
                .input((mode, self.last_input.input.clone()), Instant::now());
        }
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.cmd_prompt = self.cmd_prompt();
        self.uidata.active_cmdinput = self.active_cmdinput;
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        // Whatever is still pending is superseded by the final value
        self.debouncer.cancel();

        let Some(mode) = self.cmd_mode.take() else {
            info!("Cmd mode is none!");
            return;
        };
        let value = if self.last_input.canceled {
            std::mem::take(&mut self.cmd_original)
        } else {
            self.last_input.input.clone()
        };
        if value != self.input_value(mode) {
            self.apply_input(mode, &value);
        } else {
            self.update_table_data();
        }
    }

    fn apply_input(&mut self, mode: CMDMode, text: &str) {
        match mode {
            CMDMode::Search => self.view.set_global_filter(text),
            CMDMode::FilterColumn(column_id) => self.view.set_column_filter(column_id, text),
        }
        self.recalculate_rows();
        let nrows = self.table.rows.len();
        self.set_status_message(format!("{nrows} of {} rows", self.view.rows().len()));
    }

    fn select_row(&mut self, row: usize) {
        let table = &mut self.table;
        trace!("Select record {}", row);
        if row >= table.offset_row && row < table.offset_row + table.heigh {
            table.curser_row = row - table.offset_row;
        } else {
            table.curser_row = 0;
            table.offset_row = row;
        }
        self.update_table_data();
    }

    fn move_table_selection_beginning(&mut self) {
        self.table.curser_row = 0;
        self.table.offset_row = 0;
        self.update_table_data();
    }

    fn move_table_selection_end(&mut self) {
        let table = &mut self.table;
        let nrows = table.rows.len();
        let height = table.heigh.max(1);
        if nrows == 0 {
            return;
        }
        if nrows < height {
            table.offset_row = 0;
            table.curser_row = nrows - 1;
        } else {
            table.offset_row = nrows - height;
            table.curser_row = height - 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let table = &mut self.table;
        let target = table.abs_row().saturating_sub(size);
        if target >= table.offset_row {
            table.curser_row = target - table.offset_row;
        } else {
            // Shift table up
            table.offset_row = target;
            table.curser_row = 0;
        }
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let table = &mut self.table;
        let nrows = table.rows.len();
        let height = table.heigh.max(1);
        if table.abs_row() + 1 < nrows {
            let target = std::cmp::min(table.abs_row() + size, nrows - 1);
            if target < table.offset_row + height {
                table.curser_row = target - table.offset_row;
            } else {
                // At the bottom of the table, need to shift table down
                table.offset_row = target + 1 - height;
                table.curser_row = height - 1;
            }
            self.update_table_data();
        }
    }

    fn move_table_selection_left(&mut self) {
        let table = &mut self.table;
        if table.curser_column > 0 {
            table.curser_column -= 1;
        } else if table.offset_column > 0 {
            table.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let ncolumns = self.view.visible_columns().len();
        let table = &mut self.table;
        if table.offset_column + table.curser_column + 1 < ncolumns {
            if table.curser_column + 1 < table.visible_columns.len() {
                // In the middle
                table.curser_column += 1;
            } else {
                // At the end of the screen
                table.offset_column += 1;
            }
            self.update_table_data();
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_to_clipboard(&mut self, content: String) {
        trace!("Clipboard content: {}", content);
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.set_status_message("Clipboard not available!");
            return;
        };
        match clipboard.set_text(content) {
            Ok(_) => self.set_status_message("Copied to clipboard"),
            Err(e) => trace!("Error copying to clipboard: {:?}", e),
        }
    }

    fn copy_table_cell(&mut self) {
        let (Some(row), Some(column_id)) = (self.current_row(), self.current_column()) else {
            return;
        };
        let cell = column_id.format(row);
        self.copy_to_clipboard(cell);
    }

    fn row_as_csv(row: &EnrichedRow) -> String {
        COLUMNS
            .iter()
            .map(|def| Model::wrap_cell_content(&def.id.format(row)))
            .collect::<Vec<String>>()
            .join(",")
    }

    fn copy_table_row(&mut self) {
        let row = match self.modus {
            Modus::RECORD => self
                .table
                .rows
                .get(self.record_view.record_idx)
                .map(|&idx| &self.view.rows()[idx]),
            _ => self.current_row(),
        };
        if let Some(content) = row.map(Model::row_as_csv) {
            self.copy_to_clipboard(content);
        }
    }

    fn copy_record_cell(&mut self) {
        let record = &self.record_view;
        if let Some(cell) = record
            .row_data
            .get(record.curser_offset + record.curser_row)
            .cloned()
        {
            self.copy_to_clipboard(cell);
        }
    }

    // -------------------- Record view ---------------------- //

    fn record_fields(row: &EnrichedRow) -> Vec<(String, String)> {
        let entry = &row.entry;
        let tier = |t: Option<i64>| t.map(|t| t.to_string()).unwrap_or_default();
        let mut fields: Vec<(String, String)> = COLUMNS
            .iter()
            .map(|def| (def.header.to_string(), def.id.format(row)))
            .collect();
        fields.extend([
            ("Id".to_string(), row.player.player_id.clone()),
            (
                "Strategy".to_string(),
                entry.strategy_id.clone().unwrap_or_default(),
            ),
            ("Mantra".to_string(), row.player.mantra_roles.join(", ")),
            ("F2".to_string(), tier(entry.fascia_second)),
            ("F3".to_string(), tier(entry.fascia_third)),
            (
                "Target".to_string(),
                entry
                    .target
                    .map(|t| if t { "yes" } else { "no" }.to_string())
                    .unwrap_or_default(),
            ),
            ("Comment".to_string(), entry.comment.clone().unwrap_or_default()),
        ]);
        fields
    }

    fn build_record_view(&mut self, record_idx: usize) {
        trace!("Building record view ...");
        let record = &mut self.record_view;
        record.curser_offset = 0;
        record.curser_row = 0;
        record.record_idx = record_idx;
        self.update_record_data();
    }

    fn update_record_data(&mut self) {
        let Some(&ridx) = self.table.rows.get(self.record_view.record_idx) else {
            error!("Record {} is not in the table", self.record_view.record_idx);
            return;
        };
        let (headers, values): (Vec<String>, Vec<String>) =
            Self::record_fields(&self.view.rows()[ridx]).into_iter().unzip();

        let record = &mut self.record_view;
        record.height = self.uilayout.table_height.max(1);
        record.width = self.uilayout.table_width;
        record.header_data = headers;
        record.row_data = values;
        record.header_width = record
            .header_data
            .iter()
            .map(|h| h.chars().count())
            .max()
            .unwrap_or(0);

        let rbegin = record.curser_offset;
        let rend = std::cmp::min(rbegin + record.height, record.row_data.len());
        record.header_view = ColumnView {
            name: "Field".to_string(),
            filter: None,
            data: record.header_data[rbegin..rend].to_vec(),
            width: record.header_width,
        };
        record.row_view = ColumnView {
            name: "Value".to_string(),
            filter: None,
            data: record.row_data[rbegin..rend].to_vec(),
            width: record.width.saturating_sub(record.header_width + 1),
        };

        self.update_uidata_for_record();
    }

    fn update_uidata_for_record(&mut self) {
        let record = &self.record_view;
        let name = self
            .table
            .rows
            .get(record.record_idx)
            .map(|&idx| self.view.rows()[idx].player.name.clone())
            .unwrap_or_default();
        self.uidata = UIData {
            name: format!("R[{name}]"),
            table: vec![record.header_view.clone(), record.row_view.clone()],
            show_filters: false,
            nrows: self.table.rows.len(),
            selected_row: record.curser_row,
            selected_column: 1,
            // Show which record we are looking at instead of the line in the record
            abs_selected_row: record.record_idx,
            show_popup: false,
            popup_message: String::new(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_prompt: String::new(),
            active_cmdinput: false,
            global_filter: self.view.global_filter().to_string(),
            status_message: self.status_message.clone(),
        }
    }

    fn move_record_selection_up(&mut self, size: usize) {
        let record = &mut self.record_view;
        if record.curser_row > 0 {
            record.curser_row = record.curser_row.saturating_sub(size);
        } else {
            record.curser_offset = record.curser_offset.saturating_sub(size);
        }
        self.update_record_data();
    }

    fn move_record_selection_down(&mut self, size: usize) {
        let record = &mut self.record_view;
        let nfields = record.row_data.len();
        let abs = record.curser_offset + record.curser_row;
        if abs + 1 < nfields {
            let target = std::cmp::min(abs + size, nfields - 1);
            if target < record.curser_offset + record.height {
                record.curser_row = target - record.curser_offset;
            } else {
                record.curser_offset = target + 1 - record.height;
                record.curser_row = record.height - 1;
            }
            self.update_record_data();
        }
    }

    fn previous_record(&mut self) {
        let record = &mut self.record_view;
        record.record_idx = record.record_idx.saturating_sub(1);
        self.update_record_data();
    }

    fn next_record(&mut self) {
        let record = &mut self.record_view;
        if record.record_idx + 1 < self.table.rows.len() {
            record.record_idx += 1;
        }
        self.update_record_data();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tests::{entry, player};
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::time::Duration;

    fn rows() -> Vec<EnrichedRow> {
        [
            ("p1", "Rossi", "ABC", 2, 50.0),
            ("p2", "Bianchi", "DEF", 3, 40.0),
            ("p3", "Rosetti", "ABC", 3, 30.0),
            ("p4", "Verdi", "GHI", 1, 20.0),
        ]
        .into_iter()
        .map(|(id, name, team, fascia, price)| EnrichedRow {
            entry: entry(id, Some(fascia), price),
            player: player(id, name, team, "A"),
        })
        .collect()
    }

    fn model() -> Model {
        Model::init(&BoardConfig::default(), rows(), 200, 40)
    }

    fn send(model: &mut Model, message: Message) {
        model.update(Some(message)).unwrap();
    }

    fn type_text(model: &mut Model, text: &str) {
        for c in text.chars() {
            send(
                model,
                Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)),
            );
        }
    }

    fn key(model: &mut Model, code: KeyCode) {
        send(model, Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn column_data(model: &Model, header: &str) -> Vec<String> {
        model
            .get_uidata()
            .table
            .iter()
            .find(|c| c.name.starts_with(header))
            .map(|c| c.data.clone())
            .unwrap_or_default()
    }

    #[test]
    fn renders_all_rows_and_filter_row() {
        let model = model();
        let uidata = model.get_uidata();
        assert_eq!(uidata.nrows, 4);
        assert_eq!(column_data(&model, "Name"), vec!["Rossi", "Bianchi", "Rosetti", "Verdi"]);
        assert_eq!(column_data(&model, "Budget")[0], "10.00%");

        let fascia = &uidata.table[0];
        assert_eq!(fascia.filter.as_deref(), Some(FILTER_PLACEHOLDER));
        let price = uidata.table.iter().find(|c| c.name.starts_with("Prezzo")).unwrap();
        assert_eq!(price.filter, None);
    }

    #[test]
    fn search_is_debounced() {
        let mut model = model();
        send(&mut model, Message::Search);
        assert!(model.raw_keyevents());
        type_text(&mut model, "ros");

        // Nothing applied while typing
        assert_eq!(model.get_uidata().nrows, 4);
        model.tick(Instant::now());
        assert_eq!(model.get_uidata().nrows, 4);

        model.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(model.get_uidata().nrows, 2);
        assert_eq!(model.get_uidata().global_filter, "ros");
        // Still typing
        assert!(model.raw_keyevents());
    }

    #[test]
    fn enter_applies_immediately_and_escape_restores() {
        let mut model = model();
        send(&mut model, Message::Search);
        type_text(&mut model, "verdi");
        key(&mut model, KeyCode::Enter);
        assert!(!model.raw_keyevents());
        assert_eq!(column_data(&model, "Name"), vec!["Verdi"]);

        send(&mut model, Message::Search);
        key(&mut model, KeyCode::Backspace);
        key(&mut model, KeyCode::Backspace);
        model.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(model.get_uidata().global_filter, "ver");
        key(&mut model, KeyCode::Esc);
        assert_eq!(model.get_uidata().global_filter, "verdi");
        assert_eq!(model.get_uidata().nrows, 1);
    }

    #[test]
    fn filtering_name_column_sorts_by_name() {
        let mut model = model();
        // Move to the name column
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::Filter);
        type_text(&mut model, "ros");
        key(&mut model, KeyCode::Enter);

        assert_eq!(column_data(&model, "Name"), vec!["Rosetti", "Rossi"]);
        let name = model.get_uidata().table.iter().find(|c| c.name.starts_with("Name")).unwrap();
        assert_eq!(name.name, "Name ▲");
        assert_eq!(name.filter.as_deref(), Some("ros"));
    }

    #[test]
    fn filter_on_unfilterable_column_is_refused() {
        let mut model = model();
        for _ in 0..5 {
            send(&mut model, Message::MoveRight);
        }
        send(&mut model, Message::Filter);
        assert!(!model.raw_keyevents());
        assert!(model.get_uidata().status_message.contains("can not be filtered"));
    }

    #[test]
    fn toggle_sort_and_empty_projection() {
        let mut model = model();
        // Fascia is numeric: descending first
        send(&mut model, Message::ToggleSort);
        assert_eq!(column_data(&model, "F"), vec!["3", "3", "2", "1"]);
        send(&mut model, Message::ToggleSort);
        assert_eq!(column_data(&model, "F"), vec!["1", "2", "3", "3"]);
        send(&mut model, Message::ToggleSort);
        assert_eq!(column_data(&model, "F"), vec!["2", "3", "3", "1"]);

        send(&mut model, Message::Search);
        type_text(&mut model, "zzz");
        key(&mut model, KeyCode::Enter);
        assert_eq!(model.get_uidata().nrows, 0);
        assert!(column_data(&model, "Name").is_empty());
        // Navigation on an empty table is a no-op
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::MoveEnd);
        send(&mut model, Message::Enter);
        assert_eq!(model.get_uidata().abs_selected_row, 0);
    }

    #[test]
    fn hide_and_show_columns() {
        let mut model = model();
        send(&mut model, Message::HideColumn);
        assert!(model.get_uidata().table.iter().all(|c| c.name != "F"));
        assert_eq!(model.get_uidata().table[0].name, "R");
        send(&mut model, Message::ShowAllColumns);
        assert_eq!(model.get_uidata().table[0].name, "F");
    }

    #[test]
    fn navigation_scrolls_the_window() {
        let mut model = Model::init(&BoardConfig::default(), rows(), 200, 6);
        // Two body rows fit
        assert_eq!(column_data(&model, "Name").len(), 2);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::MoveDown);
        assert_eq!(model.get_uidata().abs_selected_row, 2);
        assert_eq!(model.get_uidata().selected_row, 1);
        assert_eq!(column_data(&model, "Name"), vec!["Bianchi", "Rosetti"]);

        send(&mut model, Message::MoveEnd);
        assert_eq!(model.get_uidata().abs_selected_row, 3);
        send(&mut model, Message::MoveBeginning);
        assert_eq!(model.get_uidata().abs_selected_row, 0);
    }

    #[test]
    fn record_view_lists_all_fields() {
        let mut model = model();
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::Enter);
        let uidata = model.get_uidata();
        assert_eq!(uidata.name, "R[Bianchi]");
        assert_eq!(uidata.table.len(), 2);
        assert_eq!(uidata.table[0].data[0], "F");
        assert_eq!(uidata.table[1].data[0], "3");
        assert!(uidata.table[0].data.contains(&"Comment".to_string()));

        send(&mut model, Message::MoveRight);
        assert_eq!(model.get_uidata().name, "R[Rosetti]");
        send(&mut model, Message::Exit);
        assert_eq!(model.get_uidata().abs_selected_row, 2);
    }

    #[test]
    fn help_popup_and_quit() {
        let mut model = model();
        send(&mut model, Message::Help);
        assert!(model.get_uidata().show_popup);
        send(&mut model, Message::Exit);
        assert!(!model.get_uidata().show_popup);
        send(&mut model, Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn csv_row_quotes_cells() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a, b"), "\"a, b\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
        let csv = Model::row_as_csv(&rows()[0]);
        assert!(csv.starts_with("2,A,Rossi,ABC,,50,10.00%,"));
    }
}
