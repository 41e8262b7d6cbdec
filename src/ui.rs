use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState,
    },
};

use crate::model::{FILTER_PLACEHOLDER, Model, UIData};

/// Status line plus command line.
pub const CMDLINE_HEIGH: usize = 2;
/// Column name plus filter line.
pub const TABLE_HEADER_HEIGHT: usize = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;

const KEY_HINTS: &str = "/ search  f filter  s sort  x hide  Enter record  c copy  ? help  q quit";

fn to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

#[derive(Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area, cmd_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_table(uidata, table_area, frame);
        self.draw_statusline(uidata, status_area, frame);
        self.draw_cmdline(uidata, cmd_area, frame);
        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_table(&mut self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(1),
            Constraint::Length(to_u16(SCROLLBAR_WIDTH)),
        ])
        .areas(area);

        let header_height = if uidata.show_filters {
            TABLE_HEADER_HEIGHT
        } else {
            1
        };
        let header = Row::new(uidata.table.iter().map(|column| {
            let mut lines = vec![Line::from(column.name.as_str()).bold()];
            if uidata.show_filters {
                lines.push(match column.filter.as_deref() {
                    Some(FILTER_PLACEHOLDER) => Line::from(FILTER_PLACEHOLDER).dark_gray().italic(),
                    Some(filter) => Line::from(filter).yellow(),
                    None => Line::default(),
                });
            }
            Cell::from(Text::from(lines))
        }))
        .height(to_u16(header_height))
        .style(Style::new().add_modifier(Modifier::UNDERLINED));

        let nvisible = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nvisible).map(|ridx| {
            Row::new(
                uidata
                    .table
                    .iter()
                    .map(|column| Cell::from(column.data[ridx].as_str())),
            )
        });
        let widths = uidata
            .table
            .iter()
            .map(|column| Constraint::Length(to_u16(column.width)));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(Style::new().bg(Color::DarkGray))
            .cell_highlight_style(Style::new().reversed());

        self.table_state = TableState::default()
            .with_selected((nvisible > 0).then_some(uidata.selected_row))
            .with_selected_column((nvisible > 0).then_some(uidata.selected_column));
        frame.render_stateful_widget(table, table_area, &mut self.table_state);

        if uidata.nrows == 0 {
            let header_height = to_u16(header_height);
            let message_area = Rect {
                y: table_area.y.saturating_add(header_height),
                height: table_area.height.saturating_sub(header_height),
                ..table_area
            };
            frame.render_widget(
                Paragraph::new("No results").italic().centered(),
                message_area,
            );
        }

        let mut scrollbar_state =
            ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        let position = if uidata.nrows == 0 {
            "0/0".to_string()
        } else {
            format!("{}/{}", uidata.abs_selected_row + 1, uidata.nrows)
        };
        let mut spans = vec![
            Span::from(format!(" {} ", uidata.name)).bold().reversed(),
            Span::from(format!(" {position} ")),
        ];
        if !uidata.global_filter.is_empty() {
            spans.push(Span::from(format!("/{} ", uidata.global_filter)).yellow());
        }
        spans.push(Span::from(uidata.status_message.as_str()).dark_gray());
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_cmdline(&self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        if !uidata.active_cmdinput {
            frame.render_widget(Paragraph::new(KEY_HINTS).dark_gray(), area);
            return;
        }
        let line = Line::from(vec![
            Span::from(uidata.cmd_prompt.as_str()).bold(),
            Span::from(uidata.cmdinput.input.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), area);

        let x = uidata.cmd_prompt.chars().count() + uidata.cmdinput.curser_pos;
        frame.set_cursor_position(Position::new(
            area.x.saturating_add(to_u16(x)),
            area.y,
        ));
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let [area] = Layout::horizontal([Constraint::Percentage(60)])
            .flex(Flex::Center)
            .areas(frame.area());
        let [area] = Layout::vertical([Constraint::Percentage(70)])
            .flex(Flex::Center)
            .areas(area);

        let popup = Paragraph::new(uidata.popup_message.as_str())
            .block(Block::bordered().title(" Help ").title_bottom(" Esc to close "));
        frame.render_widget(Clear, area);
        frame.render_widget(popup, area);
    }
}
