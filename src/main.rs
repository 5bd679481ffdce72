use std::env;
use std::f32::consts::FRAC_PI_2;

use anyhow::{anyhow, Result};
use glam::Vec3;
use vantage::{
    cuboid, plane, torus, App, Camera, FrameDriver, Heightfield, Light, Material, NullBackend,
    OrbitControls, OrbitSettings, Projection, Renderable, RendererConfig, Scene,
    ShadowProjection, TextureImage, Transform, WindowInitError,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let scene = demo_scene();
    let camera = Camera::new(
        Projection {
            fov_degrees: 75.0,
            aspect: 1280.0 / 720.0,
            near: 0.1,
            far: 1000.0,
        },
        Vec3::new(0.0, 0.0, 40.0),
        Vec3::ZERO,
    )?;
    let controls = OrbitControls::new(&camera, OrbitSettings::default());

    if options.headless {
        return run_headless(scene, camera, controls, options.frames);
    }

    let app = App::new(
        scene,
        camera,
        controls,
        RendererConfig::default(),
        "Vantage",
    );
    match app.run() {
        Ok(scene) => {
            print_final_state(&scene);
            Ok(())
        }
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(demo_scene(), camera, OrbitControls::new(&camera, OrbitSettings::default()), options.frames)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(
    mut scene: Scene,
    mut camera: Camera,
    mut controls: OrbitControls,
    frames: u64,
) -> Result<()> {
    println!("Running {frames} headless frame(s)...");
    let mut driver = FrameDriver::new();
    let mut backend = NullBackend;
    for _ in 0..frames {
        driver.tick(&mut scene, &mut controls, &mut camera, &mut backend)?;
    }
    print_final_state(&scene);
    Ok(())
}

fn print_final_state(scene: &Scene) {
    println!("Final object states:");
    for renderable in scene.renderables() {
        let rotation = renderable.transform.rotation;
        println!(
            " - {} rot=({:.3}, {:.3}, {:.3})",
            renderable.name, rotation.x, rotation.y, rotation.z
        );
    }
}

/// The demo scene: a textured cube, a mirror-like torus and a displaced
/// terrain plane, lit by one shadow casting point light plus ambient fill.
fn demo_scene() -> Scene {
    let mut scene = Scene::new();

    scene.add_light(Light::Point {
        color: Vec3::ONE,
        intensity: 1.5,
        position: Vec3::new(30.0, 20.0, 20.0),
        shadow: Some(ShadowProjection {
            map_size: 512,
            near: 0.5,
            far: 200.0,
        }),
    });
    scene.add_light(Light::Ambient {
        color: Vec3::ONE,
        intensity: 0.3,
    });

    scene.add_renderable(
        Renderable::new(
            "cube",
            cuboid(10.0, 10.0, 10.0),
            Material {
                base_color: Vec3::ONE,
                metalness: 0.2,
                roughness: 0.6,
                color_map: Some(TextureImage::checkerboard(
                    64,
                    8,
                    [214, 196, 148, 255],
                    [96, 72, 48, 255],
                )),
            },
        )
        .with_shadows(true, true)
        .with_spin(Vec3::splat(0.005)),
    );

    scene.add_renderable(
        Renderable::new(
            "torus",
            torus(11.0, 1.0, 16, 100),
            Material {
                base_color: Vec3::splat(0.9),
                metalness: 1.0,
                roughness: 0.0,
                color_map: None,
            },
        )
        .with_shadows(true, false)
        .with_spin(Vec3::splat(-0.007)),
    );

    let mut terrain_mesh = plane(400.0, 300.0, 64, 64);
    terrain_mesh.displace(&terrain_heightfield(), 35.0);
    scene.add_renderable(
        Renderable::new(
            "terrain",
            terrain_mesh,
            Material {
                base_color: Vec3::splat(0.5),
                metalness: 0.0,
                roughness: 0.9,
                color_map: None,
            },
        )
        .with_transform(Transform {
            position: Vec3::new(0.0, -50.0, -30.0),
            // The plane is generated facing +Z; pitch it down to lie flat.
            rotation: Vec3::new(-FRAC_PI_2, 0.0, 0.0),
            scale: Vec3::ONE,
        })
        .with_shadows(false, true),
    );

    scene
}

/// Synthesised stand-in for the mountain height map the original demo
/// loads from disk; image decoding belongs to an external asset loader.
fn terrain_heightfield() -> Heightfield {
    Heightfield::from_fn(128, 128, |u, v| {
        let ridges = (u * 19.0).sin() * (v * 23.0).cos() * 0.25;
        let hills = (u * 5.0 + 1.3).sin() * (v * 7.0 + 0.7).sin() * 0.45;
        0.4 + ridges + hills * 0.6
    })
}

struct CliOptions {
    headless: bool,
    frames: u64,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut headless = false;
        let mut frames = 200;
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => headless = true,
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames requires a value"))?;
                    frames = value
                        .parse::<u64>()
                        .map_err(|err| anyhow!("invalid --frames value {value}: {err}"))?;
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: vantage [--headless] [--frames N]"
                    ));
                }
            }
        }
        Ok(Self { headless, frames })
    }
}
