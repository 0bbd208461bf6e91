pub mod charting;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Screen};
use crate::ledger::CharStatus;
use crate::saver::SaveStatus;
use crate::session::{Session, SessionState};
use crate::settings::TestMode;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Typing => render_typing(&self.session, area, buf),
            Screen::Results => render_results(self, area, buf),
        }
    }
}

fn render_typing(session: &Session, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = Style::default()
        .patch(dim_bold_style)
        .add_modifier(Modifier::UNDERLINED);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let prompt_width = session.prompt().width();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_occupied_lines = if prompt_width <= max_chars_per_line as usize {
        1
    } else {
        ((prompt_width as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
    };
    let padding = area.height.saturating_sub(prompt_occupied_lines + 4) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(2), // timer / settings line
            Constraint::Length(prompt_occupied_lines),
            Constraint::Length(1),
            Constraint::Length(1), // legend
            Constraint::Min(0),
        ])
        .split(area);

    let status_line = match session.state() {
        SessionState::Idle => {
            let settings = session.settings();
            let unit = match settings.mode {
                TestMode::Time => "s",
                TestMode::Words => " words",
            };
            format!(
                "{} {}{}  {}",
                settings.mode, settings.duration, unit, settings.difficulty
            )
        }
        _ => match session.time_left() {
            Some(left) => left.to_string(),
            None => format!("{:.1}", session.elapsed_secs()),
        },
    };
    Paragraph::new(Span::styled(status_line, dim_bold_style))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let spans = session
        .characters()
        .iter()
        .enumerate()
        .map(|(idx, ch)| {
            let style = match ch.status {
                CharStatus::Correct => green_bold_style,
                CharStatus::Incorrect | CharStatus::Missed => red_bold_style,
                CharStatus::Pending if idx == session.cursor() => underlined_dim_bold_style,
                CharStatus::Pending => dim_bold_style,
            };
            let glyph = match (ch.status, ch.glyph) {
                (CharStatus::Incorrect, ' ') => "·".to_owned(),
                (_, c) => c.to_string(),
            };
            Span::styled(glyph, style)
        })
        .collect::<Vec<Span>>();

    Paragraph::new(Line::from(spans))
        .alignment(if prompt_occupied_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

    let legend = if session.state() == SessionState::Idle {
        "(←/→) duration / (↑) mode / (↓) difficulty / (tab) new / (esc)ape"
    } else {
        "(enter) finish / (tab) restart / (esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let stats = session.stats();
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let magenta_style = Style::default().fg(Color::Magenta);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // character counts
            Constraint::Length(1), // save status
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let (overall_duration, highest_wpm) =
        charting::compute_chart_params(session.wpm_history(), stats.total_time);
    let points = charting::chart_points(session.wpm_history());
    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta_style)
        .graph_type(GraphType::Line)
        .data(&points)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([1.0, overall_duration])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(charting::format_label(overall_duration), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(charting::format_label(highest_wpm), bold_style),
                ]),
        )
        .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {} raw   {:.1}s",
            stats.wpm,
            stats.accuracy,
            stats.raw_wpm(),
            stats.total_time
        ),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!(
            "{} correct / {} incorrect / {} missed",
            stats.correct, stats.incorrect, stats.missed
        ),
        Style::default().fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let (save_text, save_style) = match app.save_status() {
        None => ("not saved".to_owned(), Style::default().add_modifier(Modifier::DIM)),
        Some(SaveStatus::Idle) | Some(SaveStatus::Saving) => {
            ("saving...".to_owned(), Style::default().fg(Color::Yellow))
        }
        Some(SaveStatus::Saved { .. }) => ("saved".to_owned(), Style::default().fg(Color::Green)),
        Some(SaveStatus::Failed { error, .. }) => (
            format!("save failed: {} (s to retry)", error.kind()),
            Style::default().fg(Color::Red),
        ),
    };
    Paragraph::new(Span::styled(save_text, save_style))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    Paragraph::new(Span::styled("(r)etry / (n)ew / (esc)ape", italic_style)).render(chunks[5], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::settings::{Difficulty, TestSettings};
    use crate::text_gen::FixedPrompt;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::time::Duration;

    fn create_test_app(settings: TestSettings, prompt: &str) -> (App, ManualClock) {
        let clock = ManualClock::new();
        let session = Session::new(settings, clock.clone(), FixedPrompt(prompt.to_string()));
        (App::new(session), clock)
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    fn rendered(app: &App, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn idle_screen_shows_prompt_and_settings() {
        let (app, _) = create_test_app(TestSettings::default(), "hello world");
        let text = rendered(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("hello world"));
        assert!(text.contains("time 30s  easy"));
    }

    #[test]
    fn running_time_mode_shows_seconds_left() {
        let (mut app, clock) = create_test_app(TestSettings::default(), "hello world");
        type_str(&mut app, "he");
        clock.advance(Duration::from_secs(4));
        app.on_tick();
        let text = rendered(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("26"));
        assert!(text.contains("(enter) finish"));
    }

    #[test]
    fn results_show_stats_and_save_state() {
        let (mut app, clock) =
            create_test_app(TestSettings::new(TestMode::Words, 1, Difficulty::Easy), "abcde");
        type_str(&mut app, "a");
        clock.advance(Duration::from_secs(6));
        type_str(&mut app, "bcde");
        assert_eq!(app.screen, Screen::Results);

        let text = rendered(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("10 wpm"));
        assert!(text.contains("100% acc"));
        assert!(text.contains("not saved"));
        assert!(text.contains("(r)etry"));
    }

    #[test]
    fn tiny_and_wrapping_areas_do_not_panic() {
        let long = "this is a very long prompt that should wrap across multiple lines when rendered";
        let (app, _) = create_test_app(TestSettings::default(), long);
        for area in [Rect::new(0, 0, 40, 20), Rect::new(0, 0, 5, 3), Rect::new(0, 0, 0, 0)] {
            let mut buffer = Buffer::empty(area);
            (&app).render(area, &mut buffer);
            assert_eq!(*buffer.area(), area);
        }
    }

    #[test]
    fn empty_prompt_renders() {
        let (app, _) = create_test_app(TestSettings::default(), "");
        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        (&app).render(area, &mut buffer);
        assert_eq!(*buffer.area(), area);
    }
}
