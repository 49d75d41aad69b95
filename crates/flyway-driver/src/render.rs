//! Schematic diagrams of allocations.
//!
//! ToRs are drawn as dots on a grid, row-major by index, and every allocated flow as an arrow from
//! its source to its destination. Wireless flows are thick blue arrows, wired flows thin grey
//! ones, and flows with any other link type red.

use std::path::Path;

use flyway_core::output::write_atomic;
use flyway_core::{AllocationFile, FormatError, LinkType};
use plotters::prelude::*;

/// Geometry of an allocation diagram, in pixels.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Layout {
    /// ToRs per grid row.
    #[builder(default = 4)]
    pub racks_per_row: usize,
    /// Distance between neighbouring ToRs.
    #[builder(default = 120)]
    pub spacing: u32,
    /// Blank border around the grid.
    #[builder(default = 60)]
    pub margin: u32,
    /// Radius of a ToR dot.
    #[builder(default = 10)]
    pub node_radius: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Layout {
    fn position(&self, node: usize) -> (f64, f64) {
        let col = node % self.racks_per_row;
        let row = node / self.racks_per_row;
        (
            f64::from(self.margin) + (col as f64) * f64::from(self.spacing),
            f64::from(self.margin) + (row as f64) * f64::from(self.spacing),
        )
    }

    fn canvas_size(&self, num_tors: usize) -> (u32, u32) {
        let cols = num_tors.clamp(1, self.racks_per_row) as u32;
        let rows = num_tors.max(1).div_ceil(self.racks_per_row) as u32;
        (
            2 * self.margin + (cols - 1) * self.spacing,
            2 * self.margin + (rows - 1) * self.spacing,
        )
    }
}

/// Draws the allocation over `num_tors` ToRs and writes it to `out_path` as SVG.
pub fn render_allocation_diagram(
    file: &AllocationFile,
    num_tors: usize,
    layout: &Layout,
    out_path: &Path,
) -> Result<(), RenderError> {
    let svg = render_svg(file, num_tors, layout)?;
    write_atomic(out_path, svg)?;
    log::info!(
        "Rendered allocation {}_{} to {}",
        file.scenario,
        file.variant,
        out_path.display()
    );
    Ok(())
}

fn render_svg(
    file: &AllocationFile,
    num_tors: usize,
    layout: &Layout,
) -> Result<String, RenderError> {
    if layout.racks_per_row == 0 {
        return Err(RenderError::InvalidLayout("racks_per_row must be positive"));
    }
    for record in &file.records {
        for node in [record.flow.src, record.flow.dst] {
            if node.inner() >= num_tors {
                return Err(FormatError::NodeOutOfRange { node, num_tors }.into());
            }
        }
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, layout.canvas_size(num_tors))
            .into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;
        for record in &file.records {
            let (src, dst) = (record.flow.src.inner(), record.flow.dst.inner());
            if src == dst {
                log::debug!("not drawing self-loop at ToR {src}");
                continue;
            }
            let arrow = Arrow::between(layout, src, dst);
            let style = link_style(record.link_type);
            root.draw(&PathElement::new(vec![arrow.tail, arrow.tip], style))
                .map_err(draw_error)?;
            root.draw(&Polygon::new(arrow.head.to_vec(), style.filled()))
                .map_err(draw_error)?;
        }
        for node in 0..num_tors {
            let (x, y) = layout.position(node);
            root.draw(&Circle::new(
                (x.round() as i32, y.round() as i32),
                layout.node_radius,
                BLACK.filled(),
            ))
            .map_err(draw_error)?;
        }
        root.present().map_err(draw_error)?;
    }
    Ok(svg)
}

fn link_style(link_type: LinkType) -> ShapeStyle {
    match link_type {
        LinkType::Wireless => BLUE.stroke_width(3),
        LinkType::Wired => RGBColor(150, 150, 150).stroke_width(1),
        LinkType::Unknown(_) => RED.stroke_width(2),
    }
}

fn draw_error<E: std::error::Error>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// An arrow between two ToR dots, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Arrow {
    tail: (i32, i32),
    tip: (i32, i32),
    head: [(i32, i32); 3],
}

impl Arrow {
    const HEAD_LENGTH: f64 = 10.0;
    const HEAD_HALF_WIDTH: f64 = 4.0;
    // Opposite flows between the same ToRs are drawn side by side.
    const SIDE_OFFSET: f64 = 3.0;

    fn between(layout: &Layout, src: usize, dst: usize) -> Self {
        let (x0, y0) = layout.position(src);
        let (x1, y1) = layout.position(dst);
        let len = (x1 - x0).hypot(y1 - y0);
        let (ux, uy) = ((x1 - x0) / len, (y1 - y0) / len);
        // Unit normal, to the right of the direction of travel.
        let (nx, ny) = (-uy, ux);
        let gap = f64::from(layout.node_radius);
        let (ox, oy) = (nx * Self::SIDE_OFFSET, ny * Self::SIDE_OFFSET);
        let tail = (x0 + ux * gap + ox, y0 + uy * gap + oy);
        let tip = (x1 - ux * gap + ox, y1 - uy * gap + oy);
        let base = (tip.0 - ux * Self::HEAD_LENGTH, tip.1 - uy * Self::HEAD_LENGTH);
        let w = Self::HEAD_HALF_WIDTH;
        Self {
            tail: pixel(tail),
            tip: pixel(tip),
            head: [
                pixel(tip),
                pixel((base.0 + nx * w, base.1 + ny * w)),
                pixel((base.0 - nx * w, base.1 - ny * w)),
            ],
        }
    }
}

fn pixel((x, y): (f64, f64)) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

/// Error rendering a diagram.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The layout cannot hold a diagram.
    #[error("invalid layout: {0}")]
    InvalidLayout(&'static str),

    /// The allocation names a ToR outside the diagram.
    #[error("invalid allocation")]
    Format(#[from] FormatError),

    /// The drawing backend failed.
    #[error("failed to draw diagram: {0}")]
    Draw(String),

    /// I/O error.
    #[error("IO error")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use flyway_core::{ScenarioId, VariantId};

    use super::*;

    fn allocation(text: &str) -> AllocationFile {
        AllocationFile::from_text(ScenarioId::new(0), VariantId::new(0), text).unwrap()
    }

    #[test]
    fn grid_positions() {
        let layout = Layout::default();
        assert_eq!(layout.position(0), (60.0, 60.0));
        assert_eq!(layout.position(3), (420.0, 60.0));
        assert_eq!(layout.position(5), (180.0, 180.0));
        assert_eq!(layout.canvas_size(12), (480, 360));
        assert_eq!(layout.canvas_size(2), (240, 120));
        assert_eq!(layout.canvas_size(0), (120, 120));
    }

    #[test]
    fn arrow_stops_short_of_the_dots() {
        let layout = Layout::default();
        let arrow = Arrow::between(&layout, 0, 1);
        // Rightwards: the normal points down by the side offset.
        assert_eq!(arrow.tail, (70, 63));
        assert_eq!(arrow.tip, (170, 63));
        assert_eq!(arrow.head, [(170, 63), (160, 67), (160, 59)]);
        let back = Arrow::between(&layout, 1, 0);
        assert_eq!(back.tip, (70, 57));
    }

    #[test]
    fn link_styles_differ() {
        let wireless = link_style(LinkType::Wireless);
        let wired = link_style(LinkType::Wired);
        let unknown = link_style(LinkType::from_code(0));
        assert!(wireless.stroke_width > wired.stroke_width);
        assert_ne!(wireless.color, wired.color);
        assert_ne!(unknown.color, wired.color);
    }

    #[test]
    fn svg_has_a_dot_per_tor_and_an_arrow_per_flow() -> anyhow::Result<()> {
        let file = allocation(
            "0 0 1 Tcp 100000000 1Gbps 2\n\
             0 1 2 Tcp 100000000 1Gbps 1\n\
             0 5 4 Tcp 100000000 1Gbps 7\n",
        );
        let svg = render_svg(&file, 6, &Layout::default())?;
        assert_eq!(svg.matches("<circle").count(), 6);
        assert_eq!(svg.matches("<polyline").count(), 3);
        assert_eq!(svg.matches("<polygon").count(), 3);
        Ok(())
    }

    #[test]
    fn out_of_range_node_is_rejected() {
        let file = allocation("0 0 3 Tcp 100000000 1Gbps 1\n");
        let res = render_svg(&file, 3, &Layout::default());
        assert!(matches!(
            res,
            Err(RenderError::Format(FormatError::NodeOutOfRange { num_tors: 3, .. }))
        ));
    }

    #[test]
    fn zero_racks_per_row_is_rejected() {
        let file = allocation("");
        let layout = Layout::builder().racks_per_row(0).build();
        assert!(matches!(
            render_svg(&file, 3, &layout),
            Err(RenderError::InvalidLayout(_))
        ));
    }

    #[test]
    fn writes_the_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("alloc.svg");
        let file = allocation("0 0 1 Tcp 100000000 1Gbps 1\n");
        render_allocation_diagram(&file, 2, &Layout::default(), &out)?;
        let svg = std::fs::read_to_string(&out)?;
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        Ok(())
    }
}
