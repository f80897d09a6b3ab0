//! Balanced call/return arithmetic over words. Every operation in here is a single forward or
//! backward scan over the word, as they are invoked in nested loops by the sequence bookkeeping.

use crate::{alphabet::Symbol, show::show_word, Error, SpaAlphabet};

impl<S: Symbol> SpaAlphabet<S> {
    /// Returns the index of the call symbol that invoked the procedure which is executing the
    /// symbol at position `idx`, i.e. the innermost call whose scope contains `idx`. Scans
    /// backwards starting at `idx - 1`. Returns `None` if `idx` is on the top level.
    ///
    /// # Example
    /// ```
    /// use spa_core::prelude::*;
    /// let alphabet = SpaAlphabet::new(['a'], ['F', 'G'], 'R').unwrap();
    /// let word = ['F', 'a', 'G', 'a', 'R', 'a', 'R'];
    /// assert_eq!(alphabet.find_call_index(&word, 5), Some(0));
    /// assert_eq!(alphabet.find_call_index(&word, 4), Some(2));
    /// assert_eq!(alphabet.find_call_index(&word, 0), None);
    /// ```
    pub fn find_call_index(&self, word: &[S], idx: usize) -> Option<usize> {
        let mut balance = 0usize;

        for i in (0..idx.min(word.len())).rev() {
            let sym = word[i];
            if self.is_return(sym) {
                balance += 1;
            } else if self.is_call(sym) {
                if balance > 0 {
                    balance -= 1;
                } else {
                    return Some(i);
                }
            }
        }

        None
    }

    /// Returns the index of the return symbol that terminates the procedure which is active at
    /// (before) position `idx`. Scans forward starting at `idx`. Returns `None` if there is
    /// no such return.
    pub fn find_return_index(&self, word: &[S], idx: usize) -> Option<usize> {
        let mut balance = 0usize;

        for (i, sym) in word.iter().enumerate().skip(idx) {
            if self.is_call(*sym) {
                balance += 1;
            } else if self.is_return(*sym) {
                if balance > 0 {
                    balance -= 1;
                } else {
                    return Some(i);
                }
            }
        }

        None
    }

    /// Replaces every call symbol from position `from` onward together with everything up to
    /// and including its matching return by just the call symbol. This yields the view that the
    /// currently executing procedure has on the word.
    ///
    /// Fails with [`Error::UnmatchedCall`] if some call has no matching return.
    pub fn normalize(&self, word: &[S], from: usize) -> Result<Vec<S>, Error> {
        let mut out = Vec::with_capacity(word.len().saturating_sub(from));
        let mut pending: Option<usize> = None;
        let mut balance = 0usize;

        for (i, sym) in word.iter().enumerate().skip(from) {
            let sym = *sym;
            match pending {
                None => {
                    out.push(sym);
                    if self.is_call(sym) {
                        pending = Some(i);
                        balance = 0;
                    }
                }
                Some(_) => {
                    if self.is_call(sym) {
                        balance += 1;
                    } else if self.is_return(sym) {
                        if balance > 0 {
                            balance -= 1;
                        } else {
                            pending = None;
                        }
                    }
                }
            }
        }

        match pending {
            Some(position) => Err(Error::UnmatchedCall {
                word: show_word(word),
                position,
            }),
            None => Ok(out),
        }
    }

    /// Replaces every (abstracted) call symbol with the call symbol followed by its terminating
    /// sequence and the return symbol. This is the inverse direction of [`Self::normalize`].
    pub fn expand<'t, F>(&self, word: &[S], mut terminating: F) -> Result<Vec<S>, Error>
    where
        F: FnMut(S) -> Option<&'t [S]>,
        S: 't,
    {
        let mut out = Vec::with_capacity(word.len());

        for sym in word {
            out.push(*sym);
            if self.is_call(*sym) {
                let ts =
                    terminating(*sym).ok_or_else(|| Error::MissingTerminatingSequence(sym.show()))?;
                out.extend_from_slice(ts);
                out.push(self.return_symbol());
            }
        }

        Ok(out)
    }

    /// Replaces every closed `call ... return` span by the call, its terminating sequence and
    /// the return, whenever the terminating sequence is shorter than the span content. Calls
    /// without matching return (pending calls of a prefix) are kept as they are, as are spans for
    /// which no terminating sequence is provided.
    pub fn minify_well_matched<'t, F>(&self, word: &[S], mut terminating: F) -> Vec<S>
    where
        F: FnMut(S) -> Option<&'t [S]>,
        S: 't,
    {
        self.minify_span(word, &mut terminating)
    }

    fn minify_span<'t>(
        &self,
        word: &[S],
        terminating: &mut dyn FnMut(S) -> Option<&'t [S]>,
    ) -> Vec<S> {
        let mut out = Vec::with_capacity(word.len());
        let mut i = 0;

        while i < word.len() {
            let sym = word[i];
            out.push(sym);

            if self.is_call(sym) {
                if let Some(return_idx) = self.find_return_index(word, i + 1) {
                    let content = &word[i + 1..return_idx];
                    match terminating(sym) {
                        Some(ts) if ts.len() < content.len() => out.extend_from_slice(ts),
                        _ => out.extend(self.minify_span(content, terminating)),
                    }
                    out.push(self.return_symbol());
                    i = return_idx;
                }
            }
            i += 1;
        }

        out
    }

    /// Checks that every call has a matching return and no return occurs without a pending call.
    pub fn is_well_matched(&self, word: &[S]) -> bool {
        self.check_well_matched(word).is_ok()
    }

    /// Like [`Self::is_well_matched`] but reports the position of the offending symbol.
    pub fn check_well_matched(&self, word: &[S]) -> Result<(), Error> {
        let mut pending = Vec::new();
        for (i, sym) in word.iter().enumerate() {
            if self.is_call(*sym) {
                pending.push(i);
            } else if self.is_return(*sym) && pending.pop().is_none() {
                return Err(Error::UnmatchedReturn {
                    word: show_word(word),
                    position: i,
                });
            }
        }
        match pending.first() {
            Some(&position) => Err(Error::UnmatchedCall {
                word: show_word(word),
                position,
            }),
            None => Ok(()),
        }
    }

    /// Checks that `word` is a single invocation of a procedure, i.e. it starts with a call symbol
    /// whose matching return is the last symbol of the word. Only rooted words can be accepted
    /// by a system of procedural automata.
    pub fn is_rooted(&self, word: &[S]) -> bool {
        self.check_rooted(word).is_ok()
    }

    /// Like [`Self::is_rooted`], but fails with a description of the violation.
    pub fn check_rooted(&self, word: &[S]) -> Result<(), Error> {
        self.check_well_matched(word)?;
        match word.first() {
            Some(first)
                if self.is_call(*first)
                    && self.find_return_index(word, 1) == Some(word.len() - 1) =>
            {
                Ok(())
            }
            _ => Err(Error::NotRooted(show_word(word))),
        }
    }
}
