use super::{keys, CommandContext, CommandHandler};
use crate::error::CommandError;
use crate::reply::ReplyChannel;
use crate::session::{active_window_region, CropRegion, CropRequest};
use async_trait::async_trait;
use tracing::debug;

async fn capture_and_send(
    ctx: &CommandContext,
    region: Option<CropRegion>,
    reply: &dyn ReplyChannel,
) -> Result<(), CommandError> {
    debug!(region = ?region, "Capturing screen");
    let jpeg = ctx
        .screen
        .capture(region)
        .await
        .map_err(CommandError::Collaborator)?;
    reply.send_photo(jpeg).await.map_err(CommandError::Transport)
}

/// `/screen [x y w h]`: screenshot of the crop region or an explicit one.
pub struct ScreenCommand;

#[async_trait]
impl CommandHandler for ScreenCommand {
    fn name(&self) -> &'static str {
        "screen"
    }

    fn usage(&self) -> &'static str {
        "/screen [x y w h] — Screenshot (crop applies)"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::CAPTURE)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let region = if args.is_empty() {
            ctx.session.crop_region()
        } else {
            Some(CropRegion::from_args(args).map_err(|_| {
                CommandError::InvalidArgument(
                    "Usage: /screen [x y w h]\nAll four must be integers.".to_string(),
                )
            })?)
        };
        capture_and_send(ctx, region, reply).await
    }
}

/// `/window`: screenshot of the focused window.
pub struct WindowCommand;

#[async_trait]
impl CommandHandler for WindowCommand {
    fn name(&self) -> &'static str {
        "window"
    }

    fn usage(&self) -> &'static str {
        "/window — Screenshot of the active window"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::CAPTURE)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        _args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let region = active_window_region(ctx.windows.as_ref()).await?;
        capture_and_send(ctx, Some(region), reply).await
    }
}

/// `/crop x y w h | window | clear`: set or show the capture region.
pub struct CropCommand;

impl CropCommand {
    fn parse(args: &[String]) -> Result<Option<CropRequest>, CommandError> {
        match args {
            [] => Ok(None),
            [word] if word.eq_ignore_ascii_case("clear") => Ok(Some(CropRequest::Clear)),
            [word] if word.eq_ignore_ascii_case("window") => Ok(Some(CropRequest::ActiveWindow)),
            [_, _, _, _] => CropRegion::from_args(args).map(|r| Some(CropRequest::Explicit(r))),
            _ => Err(CommandError::InvalidArgument(
                "Usage: /crop x y w h | window | clear".to_string(),
            )),
        }
    }
}

#[async_trait]
impl CommandHandler for CropCommand {
    fn name(&self) -> &'static str {
        "crop"
    }

    fn usage(&self) -> &'static str {
        "/crop x y w h | window | clear — Set capture region"
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let text = match Self::parse(args)? {
            None => match ctx.session.crop_region() {
                Some(region) => format!("Crop: {region}"),
                None => "Crop: full screen".to_string(),
            },
            Some(request) => {
                match ctx
                    .session
                    .set_crop_region(request, ctx.windows.as_ref())
                    .await?
                {
                    Some(region) => format!("Crop set: {region}"),
                    None => "Crop cleared (full screen)".to_string(),
                }
            }
        };
        reply.send_text(&text).await.map_err(CommandError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::WindowInfo;
    use crate::config::ControllerSettings;
    use crate::testing::{MockDesktop, RecordingReply, Sent};
    use mockall::predicate::eq;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_screen_uses_crop_region() {
        let region = CropRegion {
            left: 10,
            top: 20,
            width: 300,
            height: 200,
        };
        let mut desktop = MockDesktop::default();
        desktop
            .screen
            .expect_capture()
            .with(eq(Some(region)))
            .times(1)
            .returning(|_| Ok(vec![0xFF, 0xD8]));
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = desktop.into_context(ControllerSettings::default(), dir.path());
        ctx.session
            .set_crop_region(CropRequest::Explicit(region), ctx.windows.as_ref())
            .await
            .expect("crop");

        let reply = RecordingReply::new();
        ScreenCommand.handle(&ctx, &[], &reply).await.expect("screen");
        assert_eq!(reply.sent(), vec![Sent::Photo(vec![0xFF, 0xD8])]);
    }

    #[tokio::test]
    async fn test_screen_rejects_partial_region() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = MockDesktop::default().into_context(ControllerSettings::default(), dir.path());
        let reply = RecordingReply::new();

        let err = ScreenCommand
            .handle(&ctx, &strings(&["1", "2"]), &reply)
            .await
            .expect_err("partial region");
        assert!(matches!(err, CommandError::InvalidArgument(_)));
        assert!(reply.sent().is_empty());
    }

    #[tokio::test]
    async fn test_window_without_focus_is_reported() {
        let mut desktop = MockDesktop::default();
        desktop.windows.expect_active_window().returning(|| Ok(None));
        desktop.screen.expect_capture().never();
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = desktop.into_context(ControllerSettings::default(), dir.path());

        let err = WindowCommand
            .handle(&ctx, &[], &RecordingReply::new())
            .await
            .expect_err("no window");
        assert!(matches!(err, CommandError::StateValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_crop_window_then_show() {
        let mut desktop = MockDesktop::default();
        desktop.windows.expect_active_window().returning(|| {
            Ok(Some(WindowInfo {
                title: "Terminal".to_string(),
                region: CropRegion {
                    left: 0,
                    top: 0,
                    width: 800,
                    height: 600,
                },
            }))
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = desktop.into_context(ControllerSettings::default(), dir.path());
        let reply = RecordingReply::new();

        CropCommand
            .handle(&ctx, &strings(&["window"]), &reply)
            .await
            .expect("crop window");
        CropCommand.handle(&ctx, &[], &reply).await.expect("show");
        CropCommand
            .handle(&ctx, &strings(&["clear"]), &reply)
            .await
            .expect("clear");

        assert_eq!(
            reply.texts(),
            vec![
                "Crop set: 800x600 at (0, 0)",
                "Crop: 800x600 at (0, 0)",
                "Crop cleared (full screen)",
            ]
        );
    }

    #[test]
    fn test_crop_parse_rejects_garbage() {
        assert!(CropCommand::parse(&strings(&["a", "b"])).is_err());
        assert!(CropCommand::parse(&strings(&["1", "2", "0", "5"])).is_err());
        assert_eq!(
            CropCommand::parse(&strings(&["CLEAR"])).expect("clear"),
            Some(CropRequest::Clear)
        );
    }
}
