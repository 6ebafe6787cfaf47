use std::{collections::VecDeque, sync::Arc, time::Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub struct StatusBar {
    messages: Vec<Arc<str>>,
    spinner: ProgressBar,
    recv_counter: VecDeque<Instant>,
    fps_counter: VecDeque<Instant>,
    fps: f32,
    start: Instant,
    pub last_frame_time: f32,
}

impl StatusBar {
    pub fn new(multi: &MultiProgress) -> Self {
        let spinner = multi.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::default_spinner().tick_chars("⠁⠂⠄⡀⡈⡐⡠⣀⣁⣂⣄⣌⣔⣤⣥⣦⣮⣶⣷⣿⡿⠿⢟⠟⡛⠛⠫⢋⠋⠍⡉⠉⠑⠡⢁"),
        );

        Self {
            messages: Vec::new(),
            spinner,
            recv_counter: VecDeque::new(),
            fps_counter: VecDeque::new(),
            start: Instant::now(),
            last_frame_time: 0f32,
            fps: 1f32,
        }
    }

    pub fn trip_fps_counter(&mut self) {
        if let Some(last) = self.fps_counter.back() {
            self.last_frame_time = last.elapsed().as_secs_f32();
        }
        self.fps_counter.push_back(Instant::now());
        drop_older_than_one_sec(&mut self.fps_counter);

        let total_elapsed = self
            .fps_counter
            .front()
            .map(|time| time.elapsed().as_secs_f32())
            .unwrap_or(0f32);

        if total_elapsed > 0. {
            self.fps = self.fps_counter.len() as f32 / total_elapsed;
        }
        self.add_item(format!("TICK:{:.0}/s", self.fps).into());
    }

    pub fn trip_recv_counter(&mut self) {
        self.recv_counter.push_back(Instant::now());
        drop_older_than_one_sec(&mut self.recv_counter);
    }

    pub fn recv_summary(&mut self) {
        drop_older_than_one_sec(&mut self.recv_counter);
        let total_elapsed = self
            .recv_counter
            .front()
            .map(|time| time.elapsed().as_secs_f32())
            .unwrap_or(0f32);

        let rate = if total_elapsed > 0. {
            self.recv_counter.len() as f32 / total_elapsed
        } else {
            0.
        };
        self.add_item(format!("RECV:{:.0}/s", rate).into());
    }

    pub fn add_item(&mut self, str: Arc<str>) {
        self.messages.push(str);
    }

    pub fn display(&mut self) {
        let uptime = self.start.elapsed().as_secs();
        if uptime >= 1 {
            let str = self.messages.join("  ");
            self.spinner.set_message(str);
        } else {
            self.spinner.set_message("Initializing...");
        }
        self.spinner.tick();
        self.messages.clear();
    }
}

fn drop_older_than_one_sec(counter: &mut VecDeque<Instant>) {
    while let Some(time) = counter.front() {
        if time.elapsed().as_secs_f32() > 1. {
            counter.pop_front();
        } else {
            break;
        }
    }
}
