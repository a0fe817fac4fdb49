use crate::cover::{CoverArt, CoverView};
use crate::playlist::{Playlist, PlaylistOrder};
use crate::theme::Palette;
use crate::transport::PlaybackSession;
use crate::visualizer::{FramePlan, SpectrumBars};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE_WITH_VERSION: &str = "Spectra v0.1.0  ";
const KEY_HINTS: &str = "space play  n/b next/prev  ←/→ seek  +/- vol  m mute  a autoplay  z mini  t theme  1-9 jump  q quit";
const COVER_WIDTH: u16 = 16;
const VOLUME_BAR_WIDTH: usize = 10;

/// Everything one frame needs, borrowed from the app for the draw call.
pub struct View<'a> {
    pub playlist: &'a Playlist,
    pub session: &'a PlaybackSession,
    pub colors: Palette,
    pub theme_label: &'static str,
    pub plan: &'a FramePlan,
    pub gradient: bool,
    pub cover: Option<&'a CoverArt>,
    pub output: &'a str,
    pub visit_count: u64,
}

/// Screen regions the app needs outside the draw call: the visualizer size
/// for frame planning and the progress bar for mouse seeking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Regions {
    pub header: Rect,
    pub cover: Rect,
    pub info: Rect,
    pub visualizer: Rect,
    pub playlist: Rect,
    pub timeline: Rect,
    pub progress: Rect,
    pub footer: Rect,
}

pub fn layout(area: Rect, minimized: bool) -> Regions {
    if minimized {
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)])
            .split(area);
        return Regions {
            header: vertical[0],
            timeline: vertical[1],
            progress: progress_rect(vertical[1]),
            ..Regions::default()
        };
    }

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
        .split(vertical[1]);

    let stage = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(4)])
        .split(body[0]);

    let now_playing = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(COVER_WIDTH + 2), Constraint::Min(10)])
        .split(stage[0]);

    Regions {
        header: vertical[0],
        cover: now_playing[0],
        info: now_playing[1],
        visualizer: stage[1],
        playlist: body[1],
        timeline: vertical[2],
        progress: progress_rect(vertical[2]),
        footer: vertical[3],
    }
}

/// Inner cells of a bordered panel.
pub fn inner(area: Rect) -> Rect {
    area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    })
}

fn progress_rect(timeline: Rect) -> Rect {
    let chunks = timeline_chunks(inner(timeline));
    chunks[1]
}

fn timeline_chunks(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(14),
            Constraint::Min(8),
            Constraint::Length(VOLUME_BAR_WIDTH as u16 + 14),
        ])
        .split(area)
}

/// Maps a click inside the progress bar to a seek fraction. The bracket cells
/// at both ends are excluded.
pub fn seek_fraction(progress: Rect, column: u16, row: u16) -> Option<f64> {
    if !point_in_rect(column, row, progress) || progress.width < 3 {
        return None;
    }
    let track_width = f64::from(progress.width - 2);
    let offset = f64::from(column.saturating_sub(progress.x + 1));
    Some((offset / (track_width - 1.0).max(1.0)).clamp(0.0, 1.0))
}

pub fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

pub fn draw(frame: &mut Frame, view: &View<'_>) {
    let colors = view.colors;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.background)),
        frame.area(),
    );

    let regions = layout(frame.area(), view.session.minimized);
    draw_header(frame, view, regions.header);
    draw_timeline(frame, view, regions.timeline);
    if view.session.minimized {
        return;
    }

    frame.render_widget(
        panel_block("Cover", colors.card_bg, colors.text, colors.border),
        regions.cover,
    );
    frame.render_widget(CoverView::new(view.cover, colors.muted), inner(regions.cover));

    draw_info(frame, view, regions.info);

    frame.render_widget(
        panel_block("Spectrum", colors.card_bg, colors.text, colors.border),
        regions.visualizer,
    );
    frame.render_widget(
        SpectrumBars::new(view.plan, colors).gradient(view.gradient),
        inner(regions.visualizer),
    );

    draw_playlist(frame, view, regions.playlist);

    let footer = Paragraph::new(Span::styled(KEY_HINTS, Style::default().fg(colors.muted)))
        .block(panel_block("Keys", colors.card_bg, colors.text, colors.border));
    frame.render_widget(footer, regions.footer);
}

fn draw_header(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let colors = view.colors;
    frame.render_widget(
        panel_block("Player", colors.card_bg, colors.text, colors.border),
        area,
    );

    let header_inner = area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let header_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(56), Constraint::Percentage(44)])
        .split(header_inner);

    let mut left = vec![Span::styled(
        APP_TITLE_WITH_VERSION,
        Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD),
    )];
    if view.session.minimized {
        let track = view.playlist.current();
        left.push(Span::styled(
            format!("{} - {}", track.title, track.artist),
            Style::default().fg(colors.text),
        ));
    } else {
        left.push(Span::styled(
            format!(
                "Track {}/{}",
                view.playlist.current_index() + 1,
                view.playlist.len()
            ),
            Style::default().fg(colors.text),
        ));
        left.push(Span::styled("  |  ", Style::default().fg(colors.muted)));
        left.push(Span::styled(
            format!("Theme {}", view.theme_label),
            Style::default().fg(colors.primary),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(left)), header_chunks[0]);

    let right = Paragraph::new(Line::from(vec![
        Span::styled(view.output, Style::default().fg(colors.muted)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Visit #{}", view.visit_count),
            Style::default().fg(colors.muted),
        ),
    ]))
    .alignment(Alignment::Right);
    frame.render_widget(right, header_chunks[1]);
}

fn draw_info(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let colors = view.colors;
    let session = view.session;
    let track = view.playlist.current();

    let state = if session.playing { "▶ Playing" } else { "⏸ Paused" };
    let order = match view.playlist.order() {
        PlaylistOrder::Declared => "in order",
        PlaylistOrder::Shuffled => "shuffled",
    };

    let mut lines = vec![
        Line::from(Span::styled(
            track.title.as_str(),
            Style::default()
                .fg(colors.text)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("Artist  {}", track.artist),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Album   {}", track.album.as_deref().unwrap_or("-")),
            Style::default().fg(colors.muted),
        )),
        Line::from(vec![
            Span::styled(state, Style::default().fg(colors.accent)),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(
                format!(
                    "Autoplay {}",
                    if session.autoplay { "on" } else { "off" }
                ),
                Style::default().fg(colors.primary),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(order, Style::default().fg(colors.muted)),
        ]),
    ];
    if let Some(status) = &session.status {
        lines.push(Line::from(Span::styled(
            status.to_string(),
            Style::default().fg(colors.danger),
        )));
    }

    let info = Paragraph::new(lines)
        .block(panel_block(
            "Now Playing",
            colors.card_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(info, area);
}

fn draw_playlist(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let colors = view.colors;
    let current = view.playlist.current_index();
    let items: Vec<ListItem> = view
        .playlist
        .tracks()
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let marker = if index == current { "  > " } else { "    " };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(
                    format!("{}. {}", index + 1, track.title),
                    Style::default().fg(colors.text),
                ),
                Span::styled(
                    format!("  {}", track.artist),
                    Style::default().fg(colors.muted),
                ),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(current));

    let list = List::new(items)
        .block(panel_block(
            "Playlist",
            colors.card_bg,
            colors.text,
            colors.border,
        ))
        .highlight_style(
            Style::default()
                .bg(colors.border)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_timeline(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let colors = view.colors;
    let session = view.session;
    frame.render_widget(
        panel_block("Timeline", colors.card_bg, colors.text, colors.border),
        area,
    );

    let chunks = timeline_chunks(inner(area));
    let elapsed = format!(
        "{} / {}",
        format_duration(session.position),
        format_duration(session.duration)
    );
    frame.render_widget(
        Paragraph::new(Span::styled(elapsed, Style::default().fg(colors.text))),
        chunks[0],
    );

    let bar_width = usize::from(chunks[1].width.saturating_sub(2));
    let ratio = (session.duration > 0.0).then(|| session.progress());
    frame.render_widget(
        Paragraph::new(Span::styled(
            progress_bar(ratio, bar_width),
            Style::default().fg(colors.accent),
        )),
        chunks[1],
    );

    frame.render_widget(
        Paragraph::new(Span::styled(
            volume_line(session),
            Style::default().fg(colors.muted),
        ))
        .alignment(Alignment::Right),
        chunks[2],
    );
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

/// `m:ss`; anything non-finite or negative reads as zero.
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes}:{seconds:02}")
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn volume_line(session: &PlaybackSession) -> String {
    if session.muted {
        return format!("Muted {}", progress_bar(Some(0.0), VOLUME_BAR_WIDTH));
    }
    format!(
        "Vol {} {:>3}%",
        progress_bar(Some(f64::from(session.volume)), VOLUME_BAR_WIDTH),
        (session.volume * 100.0).round() as u16
    )
}
