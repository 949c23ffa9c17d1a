use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub badge_fg: Color,
  pub badge_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: [Theme; 2] = [
  Theme {
    name: "midnight",
    bg: Color::Rgb(18, 18, 24),
    fg: Color::Rgb(220, 220, 230),
    accent: Color::Rgb(255, 78, 69),
    muted: Color::Rgb(120, 120, 140),
    border: Color::Rgb(60, 60, 76),
    highlight_fg: Color::Rgb(255, 255, 255),
    highlight_bg: Color::Rgb(70, 36, 40),
    stripe_bg: Color::Rgb(24, 24, 32),
    badge_fg: Color::Rgb(255, 255, 255),
    badge_bg: Color::Rgb(40, 40, 40),
    status: Color::Rgb(120, 200, 255),
    error: Color::Rgb(255, 110, 110),
    key_fg: Color::Rgb(18, 18, 24),
    key_bg: Color::Rgb(150, 150, 170),
  },
  Theme {
    name: "paper",
    bg: Color::Rgb(250, 248, 242),
    fg: Color::Rgb(40, 40, 40),
    accent: Color::Rgb(200, 30, 30),
    muted: Color::Rgb(130, 125, 115),
    border: Color::Rgb(200, 195, 185),
    highlight_fg: Color::Rgb(20, 20, 20),
    highlight_bg: Color::Rgb(240, 215, 205),
    stripe_bg: Color::Rgb(243, 240, 232),
    badge_fg: Color::Rgb(255, 255, 255),
    badge_bg: Color::Rgb(50, 50, 50),
    status: Color::Rgb(30, 100, 170),
    error: Color::Rgb(190, 30, 30),
    key_fg: Color::Rgb(250, 248, 242),
    key_bg: Color::Rgb(110, 105, 95),
  },
];
