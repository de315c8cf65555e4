use model::WorldRect;
use protocol::{
    InvalidateReadManagerRectMessage, Message, MessageKind, ResizeMessage, UpdateModelViewMessage,
};
use rtrb::PushError;
use view::{ScreenBase, Viewport};

use crate::{FrontendError, FrontendRenderer, GpuSubmitter};

impl<S, B> FrontendRenderer<S, B>
where
    S: GpuSubmitter<B>,
{
    /// Moves the camera. Visibility is updated immediately; the backend
    /// recomputes the active set once the command reaches it.
    pub fn update_model_view(&mut self, screen: ScreenBase) -> Result<(), FrontendError> {
        self.screen = Some(screen);
        self.submitter.update_visibility(&screen, &self.active);
        self.enqueue_command(UpdateModelViewMessage::new(screen).into());
        self.flush_commands()
    }

    pub fn resize(&mut self, viewport: Viewport) -> Result<(), FrontendError> {
        self.viewport = Some(viewport);
        self.submitter.resize(viewport);
        self.enqueue_command(ResizeMessage::new(viewport).into());
        self.flush_commands()
    }

    pub fn invalidate_rect(&mut self, rect: WorldRect) -> Result<(), FrontendError> {
        self.enqueue_command(InvalidateReadManagerRectMessage::new(rect).into());
        self.flush_commands()
    }

    pub fn deferred_command_count(&self) -> usize {
        self.deferred_commands.len()
    }

    /// Consecutive camera commands of the same kind collapse into the latest
    /// one. Invalidations never collapse.
    fn enqueue_command(&mut self, command: Message<B>) {
        let kind = command.kind();
        let replaces_last = kind != MessageKind::InvalidateReadManagerRect
            && self
                .deferred_commands
                .back()
                .is_some_and(|last| last.kind() == kind);
        if replaces_last {
            self.deferred_commands.pop_back();
        }
        self.deferred_commands.push_back(command);
    }

    /// Pushes deferred commands until the ring is full.
    pub(crate) fn flush_commands(&mut self) -> Result<(), FrontendError> {
        if self.command_producer.is_abandoned() {
            self.deferred_commands.clear();
            return Err(FrontendError::Disconnected);
        }
        while let Some(command) = self.deferred_commands.pop_front() {
            match self.command_producer.push(command) {
                Ok(()) => {}
                Err(PushError::Full(command)) => {
                    log::trace!(
                        "frontend: command ring full, deferring {} commands",
                        self.deferred_commands.len() + 1
                    );
                    self.deferred_commands.push_front(command);
                    break;
                }
            }
        }
        Ok(())
    }
}
