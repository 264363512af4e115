use std::fs;
use std::path::PathBuf;
use tracing::info;
use fbdetect_lib::rdp::rdram::swap_words;
use fbdetect_lib::{
    Command, Context, FbEvent, FrameReport, LogTracer, Rdram, RecordingTracer, Tracer, Ucode,
};
use crate::config;
use crate::error::{AppError, Result};
use crate::trace::{self, Item};

#[derive(Debug, Default, PartialEq)]
pub struct Options {
    pub trace: PathBuf,
    pub config: Option<PathBuf>,
    pub rdram: Option<PathBuf>,
    pub events: bool,
}

impl Options {
    pub fn from_args<I: Iterator<Item = String>>(mut args: I) -> Result<Options> {
        let mut trace = None;
        let mut opts = Options::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => opts.config = Some(args.next().ok_or(AppError::Usage)?.into()),
                "--rdram" => opts.rdram = Some(args.next().ok_or(AppError::Usage)?.into()),
                "--events" => opts.events = true,
                _ if arg.starts_with("--") || trace.is_some() => return Err(AppError::Usage),
                _ => trace = Some(PathBuf::from(arg)),
            }
        }

        opts.trace = trace.ok_or(AppError::Usage)?;

        Ok(opts)
    }
}

/// Logs every event, and keeps them around when asked to
struct AppTracer {
    log: LogTracer,
    recorder: Option<RecordingTracer>,
}

impl Tracer for AppTracer {
    fn event(&mut self, event: FbEvent) {
        if let Some(recorder) = &mut self.recorder {
            recorder.event(event.clone());
        }

        self.log.event(event);
    }
}

pub struct App {
    ctx: Context<AppTracer>,
    ram: Vec<u8>,
    /// Commands of the frame being read
    commands: Vec<Command>,
    frames: usize,
}

impl App {
    pub fn run<I: Iterator<Item = String>>(args: I) -> Result<()> {
        let opts = Options::from_args(args)?;

        tracing_subscriber::fmt::init();
        info!("Replaying {}", opts.trace.display());

        let settings = config::load_or_default(opts.config.as_deref());
        info!("{:?}", settings);

        let ram = match &opts.rdram {
            Some(path) => {
                let mut ram = fs::read(path)?;
                swap_words(&mut ram);
                info!("Loaded {} bytes of RDRAM from {}", ram.len(), path.display());
                ram
            }
            None => Vec::new(),
        };

        let items = trace::parse(&fs::read_to_string(&opts.trace)?)?;

        let tracer = AppTracer {
            log: LogTracer,
            recorder: opts.events.then(RecordingTracer::new),
        };

        let mut app = App {
            ctx: Context::with_tracer(settings, Ucode::F3d, tracer),
            ram,
            commands: Vec::new(),
            frames: 0,
        };

        for item in items {
            match item {
                Item::Ucode(ucode) => app.ctx.set_ucode(ucode),
                Item::ViOrigin(origin) => app.ctx.set_vi_origin(origin),
                Item::Scale(x, y) => app.ctx.set_scale(x, y),
                Item::Command(cmd) => app.commands.push(cmd),
                Item::Frame => app.run_frame(),
            }
        }

        if !app.commands.is_empty() {
            app.run_frame();
        }

        info!("{} frames", app.frames);

        Ok(())
    }

    fn run_frame(&mut self) {
        let report = self.ctx.run_frame(&self.commands, Rdram::new(&self.ram));

        self.print_report(&report);

        if let Some(recorder) = &mut self.ctx.tracer_mut().recorder {
            for event in recorder.take() {
                println!("    {}", event);
            }
        }

        self.ctx.present();
        self.commands.clear();
        self.frames += 1;
    }

    fn print_report(&self, report: &FrameReport) {
        let rdp = self.ctx.rdp();

        println!(
            "frame {}: {} commands ({} handled, {} forwarded, {} unsupported)",
            self.frames,
            self.commands.len(),
            report.handled,
            report.forwarded,
            report.unsupported
        );

        for (index, ci) in rdp.color_images().iter().enumerate() {
            let marker = if index == report.main_ci_index { '*' } else { ' ' };

            println!(
                "  {}{:2} {:08x} {:4} x {:<4} {}",
                marker, index, ci.addr, ci.width, ci.height, ci.status
            );
        }

        let (scale_x, scale_y) = rdp.scale();

        println!(
            "  copy {} motion_blur {} read_previous {} halted {} scale {}x{}",
            report.copy_ci_index,
            report.motion_blur,
            report.read_previous_ci,
            report.halted,
            scale_x,
            scale_y
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> impl Iterator<Item = String> + '_ {
        s.split_whitespace().map(String::from)
    }

    #[test]
    fn options() {
        let opts = Options::from_args(args("zelda.trace --events --rdram ram.bin")).unwrap();

        assert_eq!(opts.trace, PathBuf::from("zelda.trace"));
        assert_eq!(opts.rdram, Some(PathBuf::from("ram.bin")));
        assert_eq!(opts.config, None);
        assert!(opts.events);

        assert!(matches!(Options::from_args(args("")), Err(AppError::Usage)));
        assert!(matches!(Options::from_args(args("a b")), Err(AppError::Usage)));
        assert!(matches!(Options::from_args(args("a --config")), Err(AppError::Usage)));
        assert!(matches!(Options::from_args(args("a --verbose")), Err(AppError::Usage)));
    }
}
