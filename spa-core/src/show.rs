use itertools::Itertools;

/// This method should display the time in a sensible format. If it is less than a second, it should
/// only display the milliseconds and microseconds. If it is less than a minute, it should display
/// the seconds and milliseconds. If it is less than an hour, it should display the minutes and
/// seconds. Anything longer is displayed in hours and minutes.
pub fn show_duration(duration: std::time::Duration) -> String {
    let ms = duration.as_millis();
    let us = duration.as_micros();
    let s = duration.as_secs();
    let m = s / 60;
    let h = m / 60;

    if h > 0 {
        format!("{}h {}m", h, m % 60)
    } else if m > 0 {
        format!("{}m {}s", m, s % 60)
    } else if s > 0 {
        format!("{}s {}ms", s, ms % 1000)
    } else if ms > 0 {
        format!("{}ms {}us", ms, us % 1000)
    } else {
        format!("{}us", us)
    }
}

/// Renders a finite word by concatenating the [`Show`] representation of its symbols. The
/// empty word is displayed as `ε`.
pub fn show_word<S: Show>(word: &[S]) -> String {
    if word.is_empty() {
        "ε".into()
    } else {
        word.iter().map(Show::show).join("")
    }
}

/// Helper trait which can be used to display symbols, words, states and such.
pub trait Show {
    /// Returns a human readable representation of `self`. For a symbol this should just be the
    /// symbol itself, for a state something like q0, q1, ... Just use something that makes sense.
    /// This is mainly used for logging and error messages.
    fn show(&self) -> String;
    /// Show a collection of the thing, for a collection of symbols this should be {a, b, c, ...}.
    fn show_collection<'a, I>(iter: I) -> String
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        format!("{{{}}}", iter.into_iter().map(|x| x.show()).join(", "))
    }
}

impl Show for char {
    fn show(&self) -> String {
        self.to_string()
    }
}

macro_rules! impl_show_for_integers {
    ($($ty:ident),*) => {
        $(
            impl Show for $ty {
                fn show(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_show_for_integers!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl Show for String {
    fn show(&self) -> String {
        self.clone()
    }
}

impl Show for bool {
    fn show(&self) -> String {
        match self {
            true => "+",
            false => "-",
        }
        .to_string()
    }
}

impl<S: Show> Show for [S] {
    fn show(&self) -> String {
        show_word(self)
    }
}

impl<S: Show> Show for Vec<S> {
    fn show(&self) -> String {
        show_word(self)
    }
}

impl<S: Show, T: Show> Show for (S, T) {
    fn show(&self) -> String {
        format!("({}, {})", self.0.show(), self.1.show())
    }
}

impl<S: Show + ?Sized> Show for &S {
    fn show(&self) -> String {
        S::show(*self)
    }
}
