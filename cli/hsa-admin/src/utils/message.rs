use std::fmt::Display;

/// Write a message to stderr.
///
/// In unit tests the message is also recorded in the [history::History]
/// of the current thread.
fn print_message(v: impl Display) {
    #[cfg(test)]
    {
        let history = crate::utils::message::history::History::global();
        history.push_message(format!("{v}"));
    }

    eprintln!("{v}");
}

/// alias for [print_message]
pub(crate) fn plain(v: impl Display) {
    print_message(v);
}
pub(crate) fn error(v: impl Display) {
    print_message(std::format_args!("❌ ERROR: {v}"));
}
pub(crate) fn updated(v: impl Display) {
    print_message(std::format_args!("✅ {v}"));
}
/// double width character, add an additional space for alignment
pub(crate) fn deleted(v: impl Display) {
    print_message(std::format_args!("🗑️  {v}"));
}
/// double width character, add an additional space for alignment
pub(crate) fn warning(v: impl Display) {
    print_message(std::format_args!("⚠️  {v}"));
}

/// Messages printed through this module on the current thread.
///
/// Thread local, so tests running in parallel don't see each other's
/// messages. Messages printed from other threads, e.g. tasks of a multi
/// threaded runtime, are not recorded here.
#[cfg(test)]
pub mod history {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    thread_local! {
        static THREAD_HISTORY: Rc<RefCell<VecDeque<String>>> = {
            Rc::new(RefCell::new(VecDeque::new()))
        };
    }

    pub(crate) struct History {
        messages: Rc<RefCell<VecDeque<String>>>,
    }

    impl History {
        pub(crate) fn global() -> History {
            let messages = THREAD_HISTORY.with(|h| h.clone());
            History { messages }
        }

        /// Snapshot of the messages, oldest first.
        pub(crate) fn messages(&self) -> VecDeque<String> {
            self.messages.borrow().clone()
        }

        pub(crate) fn push_message(&self, message: String) {
            self.messages.borrow_mut().push_back(message);
        }

        pub(crate) fn clear(&self) {
            self.messages.borrow_mut().clear();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::utils::message::{plain, warning};

        #[test]
        fn records_messages_of_this_thread() {
            let history = History::global();
            history.clear();

            plain("1");
            std::thread::scope(|scope| {
                scope.spawn(|| plain("elsewhere"));
            });
            warning("2");

            assert_eq!(&history.messages(), &["1", "⚠️  2"]);
            history.clear();
            assert_eq!(history.messages().len(), 0);
        }
    }
}
