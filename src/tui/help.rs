use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

fn help_lines() -> Vec<Line<'static>> {
    vec![
        Line::from("Atalhos:"),
        key_line("Enter", 9, "Enviar (desativado durante o processamento)"),
        key_line("Tab", 11, "Alternar entre arquivo e coluna alvo"),
        key_line("Backspace", 5, "Apagar o último caractere"),
        key_line("Ctrl-U", 8, "Limpar o campo em foco"),
        key_line("F1", 12, "Mostrar/ocultar esta ajuda"),
        key_line("Esc", 11, "Sair"),
        key_line("Ctrl-C", 8, "Sair"),
        Line::from(""),
        Line::from("O campo de arquivo recebe o caminho de um dataset CSV."),
        Line::from("As imagens são gravadas em --image-dir quando informado."),
    ]
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(help_lines())
        .block(Block::default().borders(Borders::ALL).title("Ajuda"));
    f.render_widget(p, area);
}
