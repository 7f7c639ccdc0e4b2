use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::{cell::RefCell, rc::Rc};

/// Output boundary towards the OS pointer. Implementations must tolerate
/// repeated identical calls (down/up/scroll are issued every frame).
pub trait PointerDriver {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn mouse_down(&mut self) -> Result<()>;
    fn mouse_up(&mut self) -> Result<()>;
    fn click(&mut self) -> Result<()>;
    fn scroll(&mut self, amount: i32) -> Result<()>;
}

// The pipeline shares one sink between the frame processor and combo actions.
impl<T: PointerDriver> PointerDriver for Rc<RefCell<T>> {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.borrow_mut().move_to(x, y)
    }
    fn mouse_down(&mut self) -> Result<()> {
        self.borrow_mut().mouse_down()
    }
    fn mouse_up(&mut self) -> Result<()> {
        self.borrow_mut().mouse_up()
    }
    fn click(&mut self) -> Result<()> {
        self.borrow_mut().click()
    }
    fn scroll(&mut self, amount: i32) -> Result<()> {
        self.borrow_mut().scroll(amount)
    }
}

pub struct UinputSink {
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new(screen_w: i32, screen_h: i32) -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create(screen_w, screen_h)?;
            return Ok(Self {
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            let _ = (screen_w, screen_h);
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self { linux: None })
        }
    }

    pub fn noop() -> Self {
        Self { linux: None }
    }

    pub fn is_live(&self) -> bool {
        self.linux.is_some()
    }

    pub fn scroll_vertical(&mut self, steps: i32) -> Result<()> {
        debug!("sink: scroll {steps}");
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.scroll_vertical(steps)?;
        }
        Ok(())
    }

    pub fn click_mouse(&mut self, which: &str) -> Result<()> {
        let button = MouseButton::parse(which)?;
        debug!("sink: click {which}");
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.press(button, 1)?;
            dev.press(button, 0)?;
        }
        let _ = button;
        Ok(())
    }

    /// Send a chord like "CTRL+EQUAL" or single "TAB"
    pub fn key_chord(&mut self, chord: &str) -> Result<()> {
        validate_chord(chord)?;
        debug!("sink: chord {chord}");
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            let keys = parse_chord(chord)?;
            // press in order
            for k in &keys {
                dev.key_send(*k, 1)?;
            }
            dev.sync()?;
            // release in reverse
            for k in keys.iter().rev() {
                dev.key_send(*k, 0)?;
            }
            dev.sync()?;
        }
        Ok(())
    }
}

impl PointerDriver for UinputSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.move_to(x, y)?;
        }
        let _ = (x, y);
        Ok(())
    }

    fn mouse_down(&mut self) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.press(MouseButton::Left, 1)?;
        }
        Ok(())
    }

    fn mouse_up(&mut self) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.press(MouseButton::Left, 0)?;
        }
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        self.click_mouse("left")
    }

    fn scroll(&mut self, amount: i32) -> Result<()> {
        self.scroll_vertical(amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn parse(which: &str) -> Result<Self> {
        match which.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(anyhow!("unknown mouse button: {other}")),
        }
    }
}

/// Checks a chord without touching any device.
pub fn validate_chord(chord: &str) -> Result<()> {
    for tok in chord.split('+') {
        key_token(&tok.trim().to_ascii_uppercase())?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyToken {
    Ctrl,
    Alt,
    Shift,
    Super,
    Tab,
    Minus,
    Equal,
    Space,
    Enter,
    Escape,
}

fn key_token(tok: &str) -> Result<KeyToken> {
    let k = match tok {
        "CTRL" | "CONTROL" => KeyToken::Ctrl,
        "ALT" => KeyToken::Alt,
        "SHIFT" => KeyToken::Shift,
        "SUPER" | "META" | "WIN" => KeyToken::Super,
        "TAB" => KeyToken::Tab,
        "MINUS" | "-" => KeyToken::Minus,
        "EQUAL" | "=" => KeyToken::Equal,
        "SPACE" => KeyToken::Space,
        "ENTER" | "RETURN" => KeyToken::Enter,
        "ESC" | "ESCAPE" => KeyToken::Escape,
        other => return Err(anyhow!("unsupported key token: {other}")),
    };
    Ok(k)
}

#[cfg(target_os = "linux")]
fn parse_chord(chord: &str) -> Result<Vec<uinput::event::keyboard::Key>> {
    use uinput::event::keyboard::Key as K;
    chord
        .split('+')
        .map(|s| {
            Ok(match key_token(&s.trim().to_ascii_uppercase())? {
                KeyToken::Ctrl => K::LeftControl,
                KeyToken::Alt => K::LeftAlt,
                KeyToken::Shift => K::LeftShift,
                KeyToken::Super => K::LeftMeta,
                KeyToken::Tab => K::Tab,
                KeyToken::Minus => K::Minus,
                KeyToken::Equal => K::Equal,
                KeyToken::Space => K::Space,
                KeyToken::Enter => K::Enter,
                KeyToken::Escape => K::Esc,
            })
        })
        .collect()
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create(screen_w: i32, screen_h: i32) -> Result<Self> {
        use uinput::event::{absolute, controller::Mouse, keyboard, relative};

        let dev = uinput::default()?
            .name("Gesturectl Virtual Pointer")?
            // absolute pointer sized to the screen
            .event(absolute::Position::X)?
            .min(0)
            .max(screen_w - 1)
            .event(absolute::Position::Y)?
            .min(0)
            .max(screen_h - 1)
            .event(relative::Wheel::Vertical)?
            // mouse buttons
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?
            // keys for chords
            .event(keyboard::Key::LeftControl)?
            .event(keyboard::Key::LeftAlt)?
            .event(keyboard::Key::LeftShift)?
            .event(keyboard::Key::LeftMeta)?
            .event(keyboard::Key::Tab)?
            .event(keyboard::Key::Minus)?
            .event(keyboard::Key::Equal)?
            .event(keyboard::Key::Space)?
            .event(keyboard::Key::Enter)?
            .event(keyboard::Key::Esc)?
            .create()?;

        info!("uinput: created virtual pointer ({screen_w}x{screen_h})");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn key_send(&mut self, key: uinput::event::keyboard::Key, val: i32) -> Result<()> {
        self.dev.send(key, val)?;
        Ok(())
    }

    fn press(&mut self, button: MouseButton, val: i32) -> Result<()> {
        use uinput::event::controller::Mouse;
        let b = match button {
            MouseButton::Left => Mouse::Left,
            MouseButton::Right => Mouse::Right,
            MouseButton::Middle => Mouse::Middle,
        };
        self.dev.send(b, val)?;
        self.sync()
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        use uinput::event::absolute::Position;
        self.dev.send(Position::X, x)?;
        self.dev.send(Position::Y, y)?;
        self.sync()
    }

    fn scroll_vertical(&mut self, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        self.dev.send(Wheel::Vertical, steps)?;
        self.sync()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Cmd {
        Move(i32, i32),
        Down,
        Up,
        Click,
        Scroll(i32),
    }

    /// Captures every pointer command in order.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingDriver {
        pub cmds: Vec<Cmd>,
    }

    impl RecordingDriver {
        pub fn count(&self, pred: impl Fn(&Cmd) -> bool) -> usize {
            self.cmds.iter().filter(|c| pred(c)).count()
        }
    }

    impl PointerDriver for RecordingDriver {
        fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
            self.cmds.push(Cmd::Move(x, y));
            Ok(())
        }
        fn mouse_down(&mut self) -> Result<()> {
            self.cmds.push(Cmd::Down);
            Ok(())
        }
        fn mouse_up(&mut self) -> Result<()> {
            self.cmds.push(Cmd::Up);
            Ok(())
        }
        fn click(&mut self) -> Result<()> {
            self.cmds.push(Cmd::Click);
            Ok(())
        }
        fn scroll(&mut self, amount: i32) -> Result<()> {
            self.cmds.push(Cmd::Scroll(amount));
            Ok(())
        }
    }

    #[test]
    fn chords_are_checked_per_token() {
        assert!(validate_chord("CTRL+EQUAL").is_ok());
        assert!(validate_chord("super + tab").is_ok());
        assert!(validate_chord("CTRL+Q").is_err());
    }

    #[test]
    fn mouse_buttons_parse_case_insensitively() {
        assert_eq!(MouseButton::parse("Right").unwrap(), MouseButton::Right);
        assert!(MouseButton::parse("fourth").is_err());
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let mut sink = UinputSink::noop();
        assert!(!sink.is_live());
        sink.move_to(10, 10).unwrap();
        sink.mouse_down().unwrap();
        sink.mouse_up().unwrap();
        sink.click().unwrap();
        sink.scroll(-20).unwrap();
        sink.key_chord("CTRL+MINUS").unwrap();
        assert!(sink.click_mouse("nope").is_err());
    }

    #[test]
    fn shared_driver_forwards() {
        let shared = Rc::new(RefCell::new(RecordingDriver::default()));
        let mut handle = shared.clone();
        handle.click().unwrap();
        handle.scroll(3).unwrap();
        assert_eq!(shared.borrow().cmds, vec![Cmd::Click, Cmd::Scroll(3)]);
    }
}
