// Copyright (c) 2024-present Tundra project contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Winter valley demo. Walk with WASD or the arrow keys, fly with Space and
//! Left Shift, look around with the left mouse button held, toggle snowfall
//! with the 1 key.

mod camera;
mod config;
mod error;
mod particles;
mod scene;
mod skybox;
mod terrain;

use crate::{
    camera::{Camera, CameraInput},
    config::Settings,
    error::TundraError,
    scene::Scene,
};
use clap::Parser;
use log::{error, info};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};
use tundra_graphics::server::{GraphicsServer, SharedGraphicsServer};
use winit::{
    dpi::LogicalSize,
    event::{DeviceEvent, ElementState, Event, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

#[derive(Parser)]
#[command(about = "Winter valley demo: terrain, water reflections and weather particles")]
struct Args {
    /// Directory containing the shaders/ and textures/ folders.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Settings file; defaults to settings.ron inside the data directory.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Default)]
struct KeyState {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    look: bool,
}

impl KeyState {
    fn camera_input(&self) -> CameraInput {
        let axis = |pos: bool, neg: bool| (pos as i32 - neg as i32) as f32;
        CameraInput {
            forward: axis(self.forward, self.back),
            side: axis(self.right, self.left),
            vertical: axis(self.up, self.down),
        }
    }
}

struct Game {
    window: Window,
    server: SharedGraphicsServer,
    scene: Scene,
    camera: Camera,
    keys: KeyState,
    start: Instant,
    last_frame: Instant,
}

impl Game {
    fn new(
        window_target: &EventLoopWindowTarget<()>,
        settings: &Settings,
        data_dir: &Path,
    ) -> Result<Self, TundraError> {
        let window_builder = WindowBuilder::new()
            .with_title(&settings.window.title)
            .with_inner_size(LogicalSize::new(settings.window.width, settings.window.height));

        let (window, server) = GraphicsServer::new(
            settings.window.vsync,
            settings.window.msaa_sample_count,
            window_target,
            window_builder,
        )?;

        let mut scene = Scene::new(&server, settings, data_dir)?;
        let size = window.inner_size();
        scene.resize(size.width, size.height);

        let camera = Camera::new(&settings.camera);

        let now = Instant::now();
        Ok(Self {
            window,
            server,
            scene,
            camera,
            keys: KeyState::default(),
            start: now,
            last_frame: now,
        })
    }

    fn on_resized(&mut self, width: u32, height: u32) {
        self.server.set_frame_size((width, height));
        self.scene.resize(width, height);
    }

    fn on_key(&mut self, event: &KeyEvent) {
        let pressed = event.state == ElementState::Pressed;
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        match code {
            KeyCode::KeyW | KeyCode::ArrowUp => self.keys.forward = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.keys.back = pressed,
            KeyCode::KeyA | KeyCode::ArrowLeft => self.keys.left = pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.keys.right = pressed,
            KeyCode::Space => self.keys.up = pressed,
            KeyCode::ShiftLeft => self.keys.down = pressed,
            KeyCode::Digit1 => {
                if pressed && !event.repeat {
                    self.scene.toggle_snowing();
                }
            }
            _ => {}
        }
    }

    fn render_frame(&mut self) -> Result<(), TundraError> {
        let now = Instant::now();
        // Clamp the step so a stall does not teleport the camera.
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        let elapsed = (now - self.start).as_secs_f32();
        self.last_frame = now;

        let scene = &self.scene;
        self.camera.update(
            self.keys.camera_input(),
            dt,
            |x, z| scene.terrain().height_at(x, z),
            scene.water_level(),
        );

        self.scene.update(dt);
        self.scene
            .render(&self.server, &self.camera.view_matrix(), elapsed)?;
        self.server.swap_buffers()?;
        Ok(())
    }
}

fn main() -> Result<(), TundraError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| args.data_dir.join("settings.ron"));
    let settings = Settings::load(&settings_path)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut game: Option<Game> = None;

    event_loop.run(move |event, window_target| match event {
        Event::Resumed => {
            if game.is_none() {
                match Game::new(window_target, &settings, &args.data_dir) {
                    Ok(new_game) => {
                        info!("Scene loaded from {}", args.data_dir.display());
                        game = Some(new_game);
                    }
                    Err(err) => {
                        error!("Failed to start: {err}");
                        window_target.exit();
                    }
                }
            }
        }
        Event::WindowEvent { event, .. } => {
            let Some(game) = game.as_mut() else {
                return;
            };
            match event {
                WindowEvent::CloseRequested => window_target.exit(),
                WindowEvent::Resized(size) => game.on_resized(size.width, size.height),
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                        window_target.exit();
                    } else {
                        game.on_key(&event);
                    }
                }
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => game.keys.look = state == ElementState::Pressed,
                WindowEvent::RedrawRequested => {
                    if let Err(err) = game.render_frame() {
                        error!("Frame failed: {err}");
                        window_target.exit();
                    }
                }
                _ => {}
            }
        }
        Event::DeviceEvent {
            event: DeviceEvent::MouseMotion { delta },
            ..
        } => {
            if let Some(game) = game.as_mut() {
                if game.keys.look {
                    game.camera.rotate(delta.0 as f32, delta.1 as f32);
                }
            }
        }
        Event::AboutToWait => {
            if let Some(game) = game.as_ref() {
                game.window.request_redraw();
            }
        }
        _ => {}
    })?;

    Ok(())
}
