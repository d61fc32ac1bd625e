use std::{
    thread,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use threadpool::ThreadPool;

use crate::util;


/// A job returns how long to wait before it runs again.
pub type FnTask = dyn Fn() -> Duration + Send + Sync + 'static;


pub struct Task {
    name: &'static str,
    job: Arc<FnTask>,
    next_time: Instant,
    running: bool,
}

impl Task {
    pub fn new<F>(name: &'static str, job: F, first_delay: Duration) -> Self where
        F: Fn() -> Duration + Send + Sync + 'static {

        Task {
            name,
            job: Arc::new(job),
            next_time: Instant::now() + first_delay,
            running: false,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        !self.running && now >= self.next_time
    }

    fn finish_job(&mut self, next_period: Duration) {
        self.next_time = Instant::now() + next_period;
        self.running = false;
    }

    fn mark_as_busy(&mut self) {
        self.running = true;
    }
}


pub struct TaskSchedulerBuilder {
    tasks: Vec<Arc<Mutex<Task>>>,
    n_workers: usize,
    period_resolution: Duration,
}

impl TaskSchedulerBuilder {
    pub fn new() -> Self {
        TaskSchedulerBuilder {
            tasks: Vec::new(),
            n_workers: 2,
            period_resolution: Duration::from_millis(250),
        }
    }

    #[cfg(test)]
    pub fn n_workers(mut self, cnt: usize) -> Self {
        self.n_workers = cnt;
        self
    }

    #[cfg(test)]
    pub fn period_resolution(mut self, period: Duration) -> Self {
        self.period_resolution = period;
        self
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(Arc::new(Mutex::new(task)));
    }

    pub fn build(self) -> TaskScheduler {
        TaskScheduler::new(self)
    }
}


pub struct TaskScheduler {
    scheduler: thread::JoinHandle<()>,
    running: Arc<Mutex<bool>>,
}

impl TaskScheduler {
    fn new(builder: TaskSchedulerBuilder) -> Self {
        let tasks = builder.tasks;
        let n_workers = builder.n_workers;
        let period_resolution = builder.period_resolution;

        let t_running = Arc::new(Mutex::new(true));
        let running = t_running.clone();

        let scheduler_job = move || {
            let pool = ThreadPool::new(n_workers);

            while *util::lock(&running) {
                let now = Instant::now();

                for m_task in &tasks {
                    let mut task = util::lock(m_task);

                    if task.ready(now) {
                        task.mark_as_busy();
                        debug!("Start job {}", task.name);

                        let job = task.job.clone();
                        let t_task = m_task.clone();
                        pool.execute(move || {
                            let next_period = job();
                            util::lock(&t_task).finish_job(next_period);
                        });
                    }
                }

                thread::sleep(period_resolution);
            }

            pool.join();
        };

        TaskScheduler {
            scheduler: thread::spawn(scheduler_job),
            running: t_running,
        }
    }

    /// Stops scheduling and waits for running jobs.
    pub fn join(self) {
        {
            let mut running = util::lock(&self.running);

            if !*running {
                return;
            }

            *running = false;
        }

        if self.scheduler.join().is_err() {
            error!("Task scheduler thread panicked");
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use super::*;

    #[test]
    fn job_repeats_until_join() {
        let count = Arc::new(AtomicUsize::new(0));
        let t_count = count.clone();

        let mut builder = TaskSchedulerBuilder::new()
            .n_workers(1)
            .period_resolution(Duration::from_millis(5));
        builder.add_task(Task::new("count", move || {
            t_count.fetch_add(1, Ordering::SeqCst);
            Duration::from_millis(1)
        }, Duration::from_millis(0)));

        let scheduler = builder.build();
        thread::sleep(Duration::from_millis(200));
        scheduler.join();

        let seen = count.load(Ordering::SeqCst);
        assert!(seen >= 2, "ran {} times", seen);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
