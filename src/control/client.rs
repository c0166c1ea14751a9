//! Typed turtle commands
//!
//! Maps the turtle vocabulary onto proxy calls: movement and setters are sent
//! without waiting, getters wait for the renderer's answer.

use serde::de::DeserializeOwned;
use serde_json::json;

use super::ControlProxy;
use crate::protocol::{Args, Kwargs};
use crate::turtle::{self, Color};
use crate::Result;

/// Turtle command set over a [`ControlProxy`]
#[derive(Debug, Clone)]
pub struct TurtleClient {
    proxy: ControlProxy,
}

impl TurtleClient {
    pub fn new(proxy: ControlProxy) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> &ControlProxy {
        &self.proxy
    }

    fn send(&self, name: &str, args: Args) -> Result<()> {
        self.proxy.send(name, args, Kwargs::new())
    }

    async fn get<R: DeserializeOwned>(&self, name: &str) -> Result<R> {
        self.proxy.call_as(name, vec![], Kwargs::new()).await
    }

    // Movement

    pub fn forward(&self, distance: f64) -> Result<()> {
        self.send("forward", vec![json!(distance)])
    }

    pub fn backward(&self, distance: f64) -> Result<()> {
        self.send("backward", vec![json!(distance)])
    }

    pub fn left(&self, degrees: f64) -> Result<()> {
        self.send("left", vec![json!(degrees)])
    }

    pub fn right(&self, degrees: f64) -> Result<()> {
        self.send("right", vec![json!(degrees)])
    }

    pub fn pen_up(&self) -> Result<()> {
        self.send("penup", vec![])
    }

    pub fn pen_down(&self) -> Result<()> {
        self.send("pendown", vec![])
    }

    /// Move to `(x, y)`, drawing if the pen is down
    pub fn goto(&self, x: f64, y: f64) -> Result<()> {
        self.send("goto", vec![json!(x), json!(y)])
    }

    /// Move to `(x, y)` without drawing
    pub fn jump_to(&self, x: f64, y: f64) -> Result<()> {
        self.send("jumpto", vec![json!(x), json!(y)])
    }

    // State setters

    pub fn set_pos(&self, x: f64, y: f64) -> Result<()> {
        self.send("setpos", vec![json!(x), json!(y)])
    }

    pub fn set_heading(&self, degrees: f64) -> Result<()> {
        self.send("setheading", vec![json!(degrees)])
    }

    pub fn set_width(&self, width: f64) -> Result<()> {
        self.send("setwidth", vec![json!(width)])
    }

    pub fn set_color(&self, color: Color) -> Result<()> {
        self.send("setcolor", vec![json!(color)])
    }

    pub fn set_fill(&self, color: Color) -> Result<()> {
        self.send("setfill", vec![json!(color)])
    }

    // Simulation control

    pub fn speed(&self, speed: u8) -> Result<()> {
        self.send("speed", vec![json!(speed)])
    }

    pub fn restart(&self) -> Result<()> {
        self.send("restart", vec![])
    }

    pub fn clear(&self) -> Result<()> {
        self.send("clear", vec![])
    }

    // State getters

    pub async fn position(&self) -> Result<(f64, f64)> {
        self.get("getpos").await
    }

    pub async fn heading(&self) -> Result<f64> {
        self.get("getheading").await
    }

    pub async fn width(&self) -> Result<f64> {
        self.get("getwidth").await
    }

    pub async fn color(&self) -> Result<Color> {
        self.get("getcolor").await
    }

    pub async fn fill(&self) -> Result<Color> {
        self.get("getfill").await
    }

    pub async fn is_down(&self) -> Result<bool> {
        self.get("isdown").await
    }

    /// Names of every command the renderer understands
    pub async fn help(&self) -> Result<Vec<String>> {
        self.get(turtle::HELP).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::channel;
    use crate::renderer::{HeadlessPresenter, RendererLoop};
    use std::time::Duration;

    fn client() -> TurtleClient {
        let (cmd_tx, cmd_rx) = channel("commands");
        let (res_tx, res_rx) = channel("results");
        let event_loop = RendererLoop::new(turtle::render_target(), HeadlessPresenter, cmd_rx, res_tx);
        tokio::spawn(event_loop.run(Duration::from_millis(2)));
        TurtleClient::new(ControlProxy::new(cmd_tx, res_rx, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_setters_then_getters() {
        let turtle = client();

        turtle.set_pos(10.0, 20.0).unwrap();
        assert_eq!(turtle.position().await.unwrap(), (10.0, 20.0));

        turtle.set_heading(45.0).unwrap();
        turtle.set_width(3.0).unwrap();
        turtle.set_color(Color::rgb(10, 20, 30)).unwrap();
        turtle.set_fill(Color::WHITE).unwrap();
        turtle.pen_up().unwrap();

        assert_eq!(turtle.heading().await.unwrap(), 45.0);
        assert_eq!(turtle.width().await.unwrap(), 3.0);
        assert_eq!(turtle.color().await.unwrap(), Color::rgb(10, 20, 30));
        assert_eq!(turtle.fill().await.unwrap(), Color::WHITE);
        assert!(!turtle.is_down().await.unwrap());
    }

    #[tokio::test]
    async fn test_movement_and_restart() {
        let turtle = client();

        turtle.forward(5.0).unwrap();
        turtle.forward(5.0).unwrap();
        turtle.backward(2.0).unwrap();
        turtle.left(90.0).unwrap();
        turtle.right(180.0).unwrap();
        turtle.goto(1.0, 1.0).unwrap();
        turtle.jump_to(3.0, 4.0).unwrap();
        turtle.speed(0).unwrap();
        turtle.clear().unwrap();

        assert_eq!(turtle.position().await.unwrap(), (3.0, 4.0));
        assert_eq!(turtle.heading().await.unwrap(), 270.0);

        turtle.pen_down().unwrap();
        turtle.restart().unwrap();
        assert_eq!(turtle.position().await.unwrap(), (0.0, 0.0));
        assert_eq!(turtle.heading().await.unwrap(), 0.0);
        assert!(turtle.is_down().await.unwrap());
    }

    #[tokio::test]
    async fn test_help() {
        let turtle = client();
        let names = turtle.help().await.unwrap();
        assert!(names.contains(&"setcolor".to_string()));
        assert!(names.contains(&"turtlehelp".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_setter_surfaces_on_next_query_only() {
        let turtle = client();

        // Fire-and-forget: the bad width is rejected renderer-side and logged
        turtle.set_width(-1.0).unwrap();
        assert_eq!(turtle.width().await.unwrap(), 2.0);
    }
}
