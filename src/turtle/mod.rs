//! Headless turtle render target
//!
//! Keeps the turtle's pose, pen settings and the segments drawn so far. A
//! windowed presenter repaints from this state; the shipped renderer binary
//! runs it without a window.

mod color;

pub use color::Color;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::target::{CallArgs, CommandRegistry, Registered, TargetError, TargetResult};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A line drawn while the pen was down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub width: f64,
    pub color: Color,
}

/// Fastest accepted animation speed
pub const MAX_SPEED: u8 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct TurtleState {
    position: Point,
    /// Degrees in [0, 360); 0 points along +x, counter-clockwise positive
    heading: f64,
    pen_down: bool,
    width: f64,
    color: Color,
    fill: Color,
    speed: u8,
    segments: Vec<Segment>,
}

impl Default for TurtleState {
    fn default() -> Self {
        Self {
            position: Point::default(),
            heading: 0.0,
            pen_down: true,
            width: 2.0,
            color: Color::BLACK,
            fill: Color::WHITE,
            speed: 5,
            segments: Vec::new(),
        }
    }
}

impl TurtleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn is_down(&self) -> bool {
        self.pen_down
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn fill(&self) -> Color {
        self.fill
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Move along the heading; a move that would leave the finite plane is
    /// rejected and the turtle stays put.
    pub fn forward(&mut self, distance: f64) -> TargetResult<()> {
        let radians = self.heading.to_radians();
        let to = Point::new(
            self.position.x + distance * radians.cos(),
            self.position.y + distance * radians.sin(),
        );
        if !(to.x.is_finite() && to.y.is_finite()) {
            return Err(TargetError::InvalidArgument(format!(
                "moving {distance} from ({}, {}) leaves the drawable plane",
                self.position.x, self.position.y
            )));
        }
        self.move_to(to, self.pen_down);
        Ok(())
    }

    pub fn left(&mut self, degrees: f64) {
        self.set_heading(self.heading + degrees);
    }

    pub fn set_heading(&mut self, degrees: f64) {
        self.heading = degrees.rem_euclid(360.0);
    }

    /// Move to `to`, drawing a segment when `draw` is set
    pub fn move_to(&mut self, to: Point, draw: bool) {
        if draw && to != self.position {
            self.segments.push(Segment {
                from: self.position,
                to,
                width: self.width,
                color: self.color,
            });
        }
        self.position = to;
    }

    /// Erase the drawing but keep the turtle where it is
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Back to the initial state, drawing included
    pub fn restart(&mut self) {
        *self = Self::default();
    }
}

/// Target arguments given either as `(x, y)`, `([x, y])` or `x=, y=`
fn point_arg(args: &CallArgs<'_>) -> TargetResult<Point> {
    if let [single] = args.positional() {
        if single.is_array() {
            args.expect_only(&["point"])?;
            let [x, y]: [f64; 2] = args.required(0, "point")?;
            if !(x.is_finite() && y.is_finite()) {
                return Err(TargetError::InvalidArgument(format!(
                    "{}: coordinates must be finite",
                    args.operation()
                )));
            }
            return Ok(Point::new(x, y));
        }
    }
    args.expect_only(&["x", "y"])?;
    Ok(Point::new(args.number(0, "x")?, args.number(1, "y")?))
}

fn color_arg(args: &CallArgs<'_>) -> TargetResult<Color> {
    args.expect_only(&["color"])?;
    args.required(0, "color")
}

fn number_arg(args: &CallArgs<'_>, key: &str) -> TargetResult<f64> {
    args.expect_only(&[key])?;
    args.number(0, key)
}

fn no_args(args: &CallArgs<'_>) -> TargetResult<()> {
    args.expect_only(&[])
}

/// Query listing every command the turtle understands
pub const HELP: &str = "turtlehelp";

/// Command table for [`TurtleState`]
pub fn registry() -> CommandRegistry<TurtleState> {
    let registry = commands();
    let mut names: Vec<String> = registry
        .names()
        .into_iter()
        .chain([HELP])
        .map(str::to_string)
        .collect();
    names.sort();

    registry.query(HELP, move |_, args| {
        no_args(args)?;
        Ok(json!(names))
    })
}

fn commands() -> CommandRegistry<TurtleState> {
    CommandRegistry::<TurtleState>::new()
        // Movement
        .action("forward", |t, args| t.forward(number_arg(args, "distance")?))
        .action("backward", |t, args| t.forward(-number_arg(args, "distance")?))
        .action("left", |t, args| {
            t.left(number_arg(args, "angle")?);
            Ok(())
        })
        .action("right", |t, args| {
            t.left(-number_arg(args, "angle")?);
            Ok(())
        })
        .action("penup", |t, args| {
            no_args(args)?;
            t.pen_down = false;
            Ok(())
        })
        .action("pendown", |t, args| {
            no_args(args)?;
            t.pen_down = true;
            Ok(())
        })
        .action("goto", |t, args| {
            let to = point_arg(args)?;
            t.move_to(to, t.pen_down);
            Ok(())
        })
        .action("jumpto", |t, args| {
            let to = point_arg(args)?;
            t.move_to(to, false);
            Ok(())
        })
        // State setters
        .action("setpos", |t, args| {
            let to = point_arg(args)?;
            t.move_to(to, false);
            Ok(())
        })
        .action("setheading", |t, args| {
            t.set_heading(number_arg(args, "angle")?);
            Ok(())
        })
        .action("setwidth", |t, args| {
            let width = number_arg(args, "width")?;
            if width <= 0.0 {
                return Err(TargetError::InvalidArgument(format!(
                    "setwidth: width must be positive, got {width}"
                )));
            }
            t.width = width;
            Ok(())
        })
        .action("setcolor", |t, args| {
            t.color = color_arg(args)?;
            Ok(())
        })
        .action("setfill", |t, args| {
            t.fill = color_arg(args)?;
            Ok(())
        })
        // Simulation control
        .action("speed", |t, args| {
            args.expect_only(&["speed"])?;
            let speed: u8 = args.required(0, "speed")?;
            if speed > MAX_SPEED {
                return Err(TargetError::InvalidArgument(format!(
                    "speed: must be between 0 and {MAX_SPEED}, got {speed}"
                )));
            }
            t.speed = speed;
            Ok(())
        })
        .action("restart", |t, args| {
            no_args(args)?;
            t.restart();
            Ok(())
        })
        .action("clear", |t, args| {
            no_args(args)?;
            t.clear();
            Ok(())
        })
        // State getters
        .query("getpos", |t, args| {
            no_args(args)?;
            Ok(json!([t.position.x, t.position.y]))
        })
        .query("getheading", |t, args| {
            no_args(args)?;
            Ok(json!(t.heading))
        })
        .query("getwidth", |t, args| {
            no_args(args)?;
            Ok(json!(t.width))
        })
        .query("getcolor", |t, args| {
            no_args(args)?;
            Ok(json!(t.color))
        })
        .query("getfill", |t, args| {
            no_args(args)?;
            Ok(json!(t.fill))
        })
        .query("isdown", |t, args| {
            no_args(args)?;
            Ok(json!(t.pen_down))
        })
}

/// A fresh turtle wired to its command table
pub fn render_target() -> Registered<TurtleState> {
    Registered::new(TurtleState::new(), Arc::new(registry()))
}
