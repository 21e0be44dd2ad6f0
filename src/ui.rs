//! Terminal UI rendering with ratatui

use crate::board::{Cell, BOARD_HEIGHT, BOARD_WIDTH};
use crate::client::{FeedStatus, LeaderboardView};
use crate::game::{GameState, Snapshot};
use crate::skill::SkillStatus;
use crate::tetromino::{Shape, MAX_SHAPE_SIZE};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const BLOCK: &str = "██";
const EMPTY: &str = "  ";

/// Total width needed: skills/stats(20) + board(22) + next/leaderboard(28) = 70
const GAME_WIDTH: u16 = 70;
/// Total height needed: board(20) + 2 for borders
const GAME_HEIGHT: u16 = 22;

/// Render one frame of a session
pub fn render_game(frame: &mut Frame, snapshot: &Snapshot, leaderboard: &LeaderboardView) {
    let area = frame.area();
    let game_area = center_rect(area, GAME_WIDTH, GAME_HEIGHT);

    // skills + stats | board | next + leaderboard
    let main_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(20),
            Constraint::Length(22), // Board (10*2 + 2 for borders)
            Constraint::Length(28),
        ])
        .split(game_area);

    let left_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(6)])
        .split(main_layout[0]);

    render_skills(frame, left_layout[0], &snapshot.skills, snapshot.slow_active);
    render_stats(frame, left_layout[1], snapshot);
    render_board(frame, main_layout[1], snapshot);

    let right_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(4)])
        .split(main_layout[2]);

    render_next(frame, right_layout[0], snapshot);
    render_leaderboard(frame, right_layout[1], leaderboard);

    match snapshot.state {
        GameState::Paused => render_overlay(frame, area, "PAUSED", "Press P to resume"),
        GameState::Over => {
            let subtitle = format!("Score {} - R to restart", snapshot.score);
            render_overlay(frame, area, "GAME OVER", &subtitle);
        }
        GameState::Running => {}
    }
}

/// Center a rect within another rect
fn center_rect(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray))
}

fn label(text: &str) -> Line<'_> {
    Line::from(Span::styled(text, Style::default().fg(Color::Gray)))
}

/// Render the game board
fn render_board(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let block = Block::default()
        .title(" BLOCKFALL ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines: Vec<Line> = snapshot
        .cells
        .iter()
        .take(BOARD_HEIGHT)
        .map(|row| {
            let spans: Vec<Span> = row
                .iter()
                .take(BOARD_WIDTH)
                .map(|cell| match cell {
                    Cell::Filled(kind) => Span::styled(BLOCK, Style::default().fg(kind.color())),
                    Cell::Empty => Span::raw(EMPTY),
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render the next piece preview
fn render_next(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let block = panel(" NEXT ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let color = snapshot.next_kind.color();
    let lines = mini_piece_rows(&snapshot.next_shape)
        .into_iter()
        .map(|row| {
            let spans: Vec<Span> = row
                .into_iter()
                .map(|filled| {
                    if filled {
                        Span::styled(BLOCK, Style::default().fg(color))
                    } else {
                        Span::raw(EMPTY)
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect::<Vec<_>>();

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

/// Rows of a shape that hold at least one block, padded to the widest shape
fn mini_piece_rows(shape: &Shape) -> Vec<[bool; MAX_SHAPE_SIZE]> {
    (0..shape.size())
        .map(|r| {
            let mut row = [false; MAX_SHAPE_SIZE];
            for (c, slot) in row.iter_mut().enumerate().take(shape.size()) {
                *slot = shape.is_filled(r, c);
            }
            row
        })
        .filter(|row| row.iter().any(|&filled| filled))
        .collect()
}

/// Render stats panel
fn render_stats(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        label("SCORE"),
        Line::from(Span::styled(
            format!("{}", snapshot.score),
            Style::default().fg(Color::Yellow).bold(),
        )),
        Line::raw(""),
        label("LINES"),
        Line::from(Span::styled(
            format!("{}", snapshot.lines),
            Style::default().fg(Color::Green),
        )),
        Line::raw(""),
        label("GRAVITY"),
        Line::from(Span::styled(
            format!("{} ms", snapshot.gravity_interval.as_millis()),
            Style::default().fg(Color::Cyan),
        )),
    ];

    if let Some(event) = &snapshot.last_event {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            event.clone(),
            Style::default().fg(Color::Magenta).bold(),
        ));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_skills(frame: &mut Frame, area: Rect, skills: &[SkillStatus], slow_active: bool) {
    let block = panel(" SKILLS ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = skills
        .iter()
        .enumerate()
        .map(|(i, status)| {
            let state = if status.ready {
                Span::styled("ready", Style::default().fg(Color::Green).bold())
            } else {
                Span::styled(
                    format!("{}s", status.remaining.as_secs_f32().ceil() as u64),
                    Style::default().fg(Color::DarkGray),
                )
            };
            Line::from(vec![
                Span::styled(format!("{} ", i + 1), Style::default().fg(Color::Gray)),
                Span::raw(format!("{:<10}", status.kind.name())),
                state,
            ])
        })
        .collect();

    if slow_active {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            "SLOW ACTIVE",
            Style::default().fg(Color::Cyan).bold(),
        ));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_leaderboard(frame: &mut Frame, area: Rect, view: &LeaderboardView) {
    let block = panel(" LEADERBOARD ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (status, color) = match view.status {
        FeedStatus::Disabled => ("offline mode", Color::DarkGray),
        FeedStatus::Connecting => ("connecting...", Color::Yellow),
        FeedStatus::Online => ("live", Color::Green),
        FeedStatus::Offline => ("reconnecting...", Color::Red),
    };
    let mut lines = vec![Line::styled(status, Style::default().fg(color))];

    if view.entries.is_empty() && view.status != FeedStatus::Disabled {
        lines.push(Line::styled("No scores yet", Style::default().fg(Color::Gray)));
    }

    let rows = (inner.height as usize).saturating_sub(1);
    for (rank, entry) in view.entries.iter().take(rows).enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("{:>2}. ", rank + 1), Style::default().fg(Color::Gray)),
            Span::raw(format!("{:<12.12}", entry.name)),
            Span::styled(
                format!("{:>8}", entry.score),
                Style::default().fg(Color::Yellow),
            ),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render an overlay (for pause/game over)
fn render_overlay(frame: &mut Frame, area: Rect, title: &str, subtitle: &str) {
    let popup_width = 30u16;
    let popup_height = 5u16;
    let popup_area = center_rect(area, popup_width, popup_height);

    // Clear the background
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let text = vec![
        Line::styled(title, Style::default().fg(Color::Yellow).bold()),
        Line::raw(""),
        Line::styled(subtitle, Style::default().fg(Color::Gray)),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Action, Game, GameConfig};
    use crate::tetromino::PieceKind;
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Instant;

    fn draw(snapshot: &Snapshot, view: &LeaderboardView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|frame| render_game(frame, snapshot, view))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_panels_render() {
        let now = Instant::now();
        let game = Game::new(GameConfig::default(), now);
        let text = draw(&game.snapshot(now), &LeaderboardView::new(FeedStatus::Connecting));
        for title in ["NEXT", "SKILLS", "LEADERBOARD", "SCORE", "ready", "connecting"] {
            assert!(text.contains(title), "missing {title}");
        }
        assert!(!text.contains("PAUSED"));
    }

    #[test]
    fn test_pause_overlay() {
        let now = Instant::now();
        let mut game = Game::new(GameConfig::default(), now);
        game.process_action(Action::TogglePause, now);
        let text = draw(&game.snapshot(now), &LeaderboardView::new(FeedStatus::Disabled));
        assert!(text.contains("PAUSED"));
        assert!(text.contains("offline mode"));
    }

    #[test]
    fn test_mini_piece_skips_empty_rows() {
        assert_eq!(mini_piece_rows(&PieceKind::I.base_shape()).len(), 1);
        assert_eq!(mini_piece_rows(&PieceKind::T.base_shape()).len(), 2);
        assert_eq!(mini_piece_rows(&PieceKind::O.base_shape()).len(), 2);
    }
}
