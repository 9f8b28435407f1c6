use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const KEYBINDS: &[(&str, &str)] = &[
    ("s", "Start campaign"),
    ("x", "Stop campaign"),
    ("r", "Reload queue and DNC list"),
    ("tab", "Switch tabs"),
    ("?", "Show this help"),
];

fn key_line(key: &str, action: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key.to_string(), Style::default().fg(Color::Magenta)),
        Span::raw(format!("{:width$}{action}", "", width = 12usize.saturating_sub(key.len()))),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit (stops an active run)"),
        ]),
    ];
    lines.extend(KEYBINDS.iter().map(|(key, action)| key_line(key, action)));
    lines.push(Line::from(""));
    lines.push(Line::from(
        "Stopping finishes the call being placed, then halts before the next number.",
    ));
    lines.push(Line::from(
        "Numbers and DNC entries are managed with `dialer numbers` and `dialer dnc`.",
    ));

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
