//! Opens a toplevel with an EGL surface and logs every frame timestamp.
//!
//! Run with `RUST_LOG=trace` to watch the frame clock and input events.

use waywin::{ShellType, WindowManager, WindowType};

fn main() -> Result<(), waywin::Error> {
    env_logger::init();

    let mut wm = WindowManager::new(ShellType::Xdg, None, true, None)?;
    let window = wm.create_window(
        640,
        480,
        WindowType::Egl,
        Box::new(|time| {
            log::trace!("frame at {time}ms");
        }),
    )?;
    window.make_current()?;

    while wm.running() {
        wm.dispatch(16)?;
    }
    Ok(())
}
