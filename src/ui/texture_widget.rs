use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;

use crate::graphics::texture::Texture;

const UPPER_HALF_BLOCK: char = '\u{2580}';

/// Copies a texture into its whole render area, two pixel rows per cell.
pub struct TextureWidget<'a> {
    texture: &'a Texture,
}

pub fn render(frame: &mut ratatui::Frame, area: Rect, texture: &Texture) {
    frame.render_widget(TextureWidget { texture }, area);
}

impl<'a> Widget for TextureWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }

        let cols = f32::from(area.width);
        let pixel_rows = f32::from(area.height) * 2.0;

        for row in 0..area.height {
            let v_top = (f32::from(row) * 2.0 + 0.5) / pixel_rows;
            let v_bottom = (f32::from(row) * 2.0 + 1.5) / pixel_rows;
            for col in 0..area.width {
                let u = (f32::from(col) + 0.5) / cols;
                let top = over_black(self.texture.sample(u, v_top));
                let bottom = over_black(self.texture.sample(u, v_bottom));
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_char(UPPER_HALF_BLOCK)
                        .set_style(Style::default().fg(top).bg(bottom));
                }
            }
        }
    }
}

/// Alpha-composite an RGBA pixel onto the black window background.
pub fn over_black([r, g, b, a]: [u8; 4]) -> Color {
    let scale = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}

/// Largest rect inside `area` with the aspect ratio of a `width` x `height`
/// window, centred. Cells count as one pixel wide and two pixels tall.
pub fn fit_viewport(area: Rect, width: u32, height: u32) -> Rect {
    if area.is_empty() || width == 0 || height == 0 {
        return area;
    }

    let cols = u64::from(area.width);
    let pixel_rows = u64::from(area.height) * 2;
    let (width, height) = (u64::from(width), u64::from(height));

    let (w, h) = if cols * height <= pixel_rows * width {
        (cols, cols * height / width / 2)
    } else {
        (pixel_rows * width / height, u64::from(area.height))
    };
    let w = (w.clamp(1, cols)) as u16;
    let h = (h.clamp(1, u64::from(area.height))) as u16;

    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    )
}
